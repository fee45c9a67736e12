use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::dao::{
    game_store::couchdb::error::CouchDaoError,
    models::{PlayerEntity, QuizEntity, SessionEntity, SessionStatusEntity},
};

pub const SESSION_PREFIX: &str = "session::";

/// Session document as stored in CouchDB: the entity body plus `_id`/`_rev`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchSessionDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(flatten)]
    pub session: SessionBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionBody {
    pub status: SessionStatusEntity,
    pub quiz: QuizEntity,
    pub current_question_index: usize,
    pub question_started_at: Option<SystemTime>,
    pub players: Vec<PlayerEntity>,
    pub created_at: SystemTime,
    pub updated_at: SystemTime,
}

impl From<(SessionEntity, Option<String>)> for CouchSessionDocument {
    fn from((session, rev): (SessionEntity, Option<String>)) -> Self {
        Self {
            id: session_doc_id(&session.pin),
            rev,
            session: SessionBody {
                status: session.status,
                quiz: session.quiz,
                current_question_index: session.current_question_index,
                question_started_at: session.question_started_at,
                players: session.players,
                created_at: session.created_at,
                updated_at: session.updated_at,
            },
        }
    }
}

impl TryFrom<CouchSessionDocument> for SessionEntity {
    type Error = CouchDaoError;

    fn try_from(doc: CouchSessionDocument) -> Result<Self, Self::Error> {
        let pin = extract_pin(&doc.id)?;
        Ok(Self {
            pin,
            status: doc.session.status,
            quiz: doc.session.quiz,
            current_question_index: doc.session.current_question_index,
            question_started_at: doc.session.question_started_at,
            players: doc.session.players,
            created_at: doc.session.created_at,
            updated_at: doc.session.updated_at,
        })
    }
}

pub fn session_doc_id(pin: &str) -> String {
    format!("{}{}", SESSION_PREFIX, pin)
}

pub fn extract_pin(doc_id: &str) -> Result<String, CouchDaoError> {
    let pin = doc_id
        .strip_prefix(SESSION_PREFIX)
        .ok_or_else(|| CouchDaoError::InvalidDocId {
            doc_id: doc_id.to_string(),
            kind: "missing session prefix",
        })?;

    if pin.is_empty() || !pin.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CouchDaoError::InvalidDocId {
            doc_id: doc_id.to_string(),
            kind: "PIN is not numeric",
        });
    }

    Ok(pin.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_ids_carry_the_pin() {
        assert_eq!(session_doc_id("482913"), "session::482913");
        assert_eq!(extract_pin("session::482913").unwrap(), "482913");
        assert!(extract_pin("game::482913").is_err());
        assert!(extract_pin("session::48x913").is_err());
    }

    #[test]
    fn document_flattens_the_body_next_to_couch_metadata() {
        let entity = SessionEntity {
            pin: "123456".into(),
            status: SessionStatusEntity::Playing,
            quiz: QuizEntity {
                title: "Space".into(),
                questions: Vec::new(),
            },
            current_question_index: 0,
            question_started_at: None,
            players: Vec::new(),
            created_at: SystemTime::UNIX_EPOCH,
            updated_at: SystemTime::UNIX_EPOCH,
        };

        let doc = CouchSessionDocument::from((entity.clone(), Some("3-abc".into())));
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["_id"], "session::123456");
        assert_eq!(json["_rev"], "3-abc");
        assert_eq!(json["status"], "playing");
        assert_eq!(json["quiz"]["title"], "Space");

        let back = SessionEntity::try_from(doc).unwrap();
        assert_eq!(back, entity);
    }
}
