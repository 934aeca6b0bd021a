pub mod store;

pub use store::{ClinicStoreClient, StoreError};
