//! Profile photos.

use bytes::Bytes;
use common::ServiceError;
use tracing::{info, warn};

use super::AttendanceService;
use crate::store::photo_key;

impl AttendanceService {
    /// Store a photo for `identifier` and return its resolved URL.
    ///
    /// The blob write is authoritative. Recording the URL on the person
    /// record afterwards is best-effort, and that URL may expire; readers
    /// that need a working link resolve it again through the blob store.
    pub async fn upload_photo(&self, identifier: &str, body: Bytes) -> Result<String, ServiceError> {
        if body.is_empty() {
            return Err(ServiceError::BadRequest("photo body is empty".into()));
        }
        self.connectivity.ensure_online()?;
        let person = self.find_person(identifier).await?;

        let key = photo_key(&self.settings.photo_category, &person.id);
        self.stores.photos.put_photo(&key, body).await?;
        let url = self
            .stores
            .photos
            .photo_url(&key)
            .await?
            .ok_or_else(|| ServiceError::Internal(format!("photo {key} missing after upload")))?;
        info!(person_id = %person.id, key, "photo stored");

        if let Err(e) = self.stores.people.set_photo_url(&person.id, &url).await {
            warn!(person_id = %person.id, error = %e, "photo url not recorded on person");
        }
        Ok(url)
    }

    /// Resolve the photo URL for `identifier`.
    ///
    /// # Errors
    ///
    /// [`ServiceError::NotFound`] when no photo has been stored.
    pub async fn photo_url(&self, identifier: &str) -> Result<String, ServiceError> {
        self.connectivity.ensure_online()?;
        let person = self.find_person(identifier).await?;
        let key = photo_key(&self.settings.photo_category, &person.id);
        self.stores
            .photos
            .photo_url(&key)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("photo for {identifier}")))
    }
}
