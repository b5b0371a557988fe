use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::clipper::CardMaterial;
use crate::error::GenerationError;
use crate::task::FieldsConfiguration;

/// A deck selected or created in the host collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeckRef {
    pub id: i64,
    pub name: String,
}

/// Collection-store boundary. Emission is fire-and-forget per card; a failure
/// here is job-fatal and not retried.
#[async_trait]
pub trait CardStore: Send + Sync {
    /// Create the deck if needed and return a reference to it
    async fn create_or_select_deck(&self, title: &str) -> Result<DeckRef, GenerationError>;

    /// Import a media file and obtain the reference token to embed in fields
    async fn import_media(&self, path: &Path) -> Result<String, GenerationError>;

    /// Create one note with the given typed field values
    async fn add_note(
        &self,
        deck: &DeckRef,
        note_type: &str,
        fields: HashMap<String, String>,
    ) -> Result<(), GenerationError>;
}

/// Render the three card fields for one finished card.
///
/// The audio and picture tokens are whatever the store returned from
/// `import_media`; the markup wrapping them is the host's reference syntax.
pub fn render_note_fields(
    card: &CardMaterial,
    audio_token: &str,
    picture_token: &str,
    fields: &FieldsConfiguration,
) -> HashMap<String, String> {
    HashMap::from([
        (fields.text_field.clone(), card.subtitle.text.clone()),
        (fields.audio_field.clone(), format!("[sound:{audio_token}]")),
        (
            fields.picture_field.clone(),
            format!("<img src=\"{picture_token}\">"),
        ),
    ])
}

/// AnkiConnect HTTP client (version-6 request envelope).
pub struct AnkiConnectStore {
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct AnkiConnectResponse<T> {
    result: Option<T>,
    error: Option<String>,
}

impl AnkiConnectStore {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, GenerationError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GenerationError::CollectionWriteFailed(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    async fn invoke<T: DeserializeOwned>(
        &self,
        action: &str,
        params: serde_json::Value,
    ) -> Result<T, GenerationError> {
        let store_err = |e: String| GenerationError::CollectionWriteFailed(e);
        debug!("anki-connect: {}", action);

        let response = self
            .client
            .post(&self.endpoint)
            .json(&json!({
                "action": action,
                "version": 6,
                "params": params,
            }))
            .send()
            .await
            .map_err(|e| store_err(format!("{action}: {e}")))?;

        let body: AnkiConnectResponse<T> = response
            .json()
            .await
            .map_err(|e| store_err(format!("{action}: bad response: {e}")))?;

        if let Some(error) = body.error {
            return Err(store_err(format!("{action}: {error}")));
        }
        body.result
            .ok_or_else(|| store_err(format!("{action}: empty result")))
    }
}

#[async_trait]
impl CardStore for AnkiConnectStore {
    async fn create_or_select_deck(&self, title: &str) -> Result<DeckRef, GenerationError> {
        // createDeck is idempotent: an existing deck's id comes back unchanged
        let id: i64 = self.invoke("createDeck", json!({ "deck": title })).await?;
        Ok(DeckRef {
            id,
            name: title.to_string(),
        })
    }

    async fn import_media(&self, path: &Path) -> Result<String, GenerationError> {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| {
                GenerationError::CollectionWriteFailed(format!(
                    "media path has no file name: {}",
                    path.display()
                ))
            })?;

        self.invoke(
            "storeMediaFile",
            json!({
                "filename": filename,
                "path": path.to_string_lossy(),
            }),
        )
        .await
    }

    async fn add_note(
        &self,
        deck: &DeckRef,
        note_type: &str,
        fields: HashMap<String, String>,
    ) -> Result<(), GenerationError> {
        let _note_id: i64 = self
            .invoke(
                "addNote",
                json!({
                    "note": {
                        "deckName": deck.name,
                        "modelName": note_type,
                        "fields": fields,
                        "options": { "allowDuplicate": true },
                    }
                }),
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clipper::ClippedMedia;
    use crate::subtitles::SubtitleRange;
    use std::path::PathBuf;
    use std::time::Duration;

    #[test]
    fn test_render_note_fields() {
        let card = CardMaterial {
            subtitle: SubtitleRange::new(
                "It was grit.",
                Duration::from_secs(62),
                Duration::from_secs(65),
            ),
            media: ClippedMedia {
                picture_path: PathBuf::from("/tmp/clip.jpeg"),
                audio_path: PathBuf::from("/tmp/clip.mp3"),
            },
        };
        let fields = FieldsConfiguration {
            note_type: "Basic".to_string(),
            text_field: "Front".to_string(),
            audio_field: "Audio".to_string(),
            picture_field: "Picture".to_string(),
        };

        let rendered = render_note_fields(&card, "clip.mp3", "clip.jpeg", &fields);

        assert_eq!(rendered["Front"], "It was grit.");
        assert_eq!(rendered["Audio"], "[sound:clip.mp3]");
        assert_eq!(rendered["Picture"], "<img src=\"clip.jpeg\">");
        assert_eq!(rendered.len(), 3);
    }
}
