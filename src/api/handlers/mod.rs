pub mod health;
pub use self::health::health;

pub mod login;
pub use self::login::{login_form, login_submit};

pub mod render;
