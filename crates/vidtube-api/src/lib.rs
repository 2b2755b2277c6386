pub mod account;
pub mod auth;
pub mod comments;
pub mod dashboard;
pub mod error;
pub mod form;
pub mod healthcheck;
pub mod likes;
pub mod mail;
pub mod media;
pub mod middleware;
pub mod playlists;
pub mod response;
pub mod routes;
pub mod state;
pub mod subscriptions;
pub mod users;
pub mod validate;
pub mod videos;

pub use auth::AuthConfig;
pub use mail::{LogMailer, Mail, Mailer};
pub use media::MediaStore;
pub use routes::router;
pub use state::{AppState, AppStateInner};
