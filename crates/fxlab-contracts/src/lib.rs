pub mod aspect;
pub mod credentials;
pub mod events;
pub mod nodes;
pub mod payload;
pub mod session;
pub mod tensor;

pub use aspect::AspectRatio;
pub use credentials::{load_credentials, CredentialError, Credentials};
pub use session::SessionId;
pub use tensor::ImageTensor;
