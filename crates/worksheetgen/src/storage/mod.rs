pub mod artifact_store;
pub mod filesystem;

pub use artifact_store::{
    artifact_store_from_config, ArtifactStore, LocalArtifactStore, StoredArtifact,
    SupabaseArtifactStore,
};
pub use filesystem::FileStorage;
