pub mod driver;
pub mod session;

pub use driver::{Driver, Locator};
pub use session::BrowserSession;
