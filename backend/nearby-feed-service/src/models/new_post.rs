use super::{DisplayIdentity, RawDocument};
use crate::spatial::{self, SpatialError};
use crate::tokenizer::entities;

/// Where a new post is located.
#[derive(Debug, Clone, PartialEq)]
pub enum GeoSource {
    Coordinates { lat: f64, lng: f64 },
    /// Client-supplied cell token at any resolution
    CellOverride(String),
}

/// Write-side builder for a post document.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub owner_key: String,
    pub message_id: String,
    pub content: String,
    pub content_type: Option<String>,
    pub time: String,
    pub media_ref: Option<String>,
    pub category: Option<String>,
    pub identity: DisplayIdentity,
    pub geo: Option<GeoSource>,
}

impl NewPost {
    /// Build the stored document: one geo token per indexed tier plus
    /// entities extracted from the content.
    pub fn into_document(self) -> Result<RawDocument, SpatialError> {
        let geo = match &self.geo {
            Some(GeoSource::Coordinates { lat, lng }) => spatial::geo_tokens_for_point(*lat, *lng)?,
            Some(GeoSource::CellOverride(token)) => {
                spatial::geo_tokens_for_cell(spatial::parse_cell(token)?)
            }
            None => Default::default(),
        };

        let (username, identity_link) = match self.identity {
            DisplayIdentity::Username(name) => (Some(name), None),
            DisplayIdentity::IdentityLink(link) => (None, Some(link)),
        };

        Ok(RawDocument {
            owner_key: Some(self.owner_key),
            message_id: Some(self.message_id),
            entities: entities::extract(&self.content),
            content: Some(self.content),
            content_type: self.content_type,
            time: Some(self.time),
            media_ref: self.media_ref,
            category: self.category,
            geo,
            username,
            identity_link,
        })
    }
}
