pub mod authorize;
pub mod callback;
pub mod credentials;
pub mod discovery;
pub mod flow;
pub mod pkce;
pub mod token;

pub use authorize::{build_authorization_url, validate_client_id, SCOPES};
pub use callback::{validate_callback, CallbackListener, CallbackResult};
pub use credentials::{
    clear_credentials, default_credentials_path, load_credentials, save_credentials, Credentials,
};
pub use discovery::{discover_endpoints, ProviderEndpoints};
pub use flow::obtain_access_token;
pub use pkce::{generate_pkce, PkceMaterial};
pub use token::{exchange_code, refresh_token, TokenSet, TokenValidation};
