use crate::config::Config;
use crate::db::SharedStore;
use crate::error::AppResult;
use crate::storage::{SharedBlobStore, UrlSigner};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: SharedStore,
    pub blobs: SharedBlobStore,
    pub signer: UrlSigner,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Arc<Config>, store: SharedStore, blobs: SharedBlobStore) -> AppResult<Self> {
        let signer = UrlSigner::new(&config.url_signing_secret, config.signed_url_ttl_secs)?;
        Ok(Self {
            store,
            blobs,
            signer,
            config,
        })
    }
}
