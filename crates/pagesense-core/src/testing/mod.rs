//! Test doubles: scripted browsers and pages plus a DOM fixture builder.

mod dom_builder;
mod fake_browser;

pub(crate) use dom_builder::DomBuilder;
pub(crate) use fake_browser::{FakeBrowser, FakeConnector, FakePage, FakeScroll, solid_frame};
