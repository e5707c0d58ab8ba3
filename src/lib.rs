pub mod error;
pub mod oauth;
pub mod settings;

pub use error::AuthflowError;
pub use oauth::flow::obtain_access_token;
pub use oauth::token::{TokenSet, TokenValidation};
pub use settings::Settings;
