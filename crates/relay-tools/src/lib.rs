pub mod model_swap;
pub mod remote;

pub use model_swap::{list_remote_models, swap_model};
pub use remote::RemoteToolClient;
