//! Buffers a multipart form into memory.
//!
//! Upload endpoints receive small files (rosters, templates, template ZIPs),
//! so every part is collected whole and size-checked while streaming.

use actix_multipart::Multipart;
use futures_util::StreamExt;

use crate::error::{AppError, AppResult};

#[derive(Debug)]
pub struct FormPart {
    pub name: String,
    pub filename: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Default)]
pub struct Form {
    parts: Vec<FormPart>,
}

impl Form {
    pub fn part(&self, name: &str) -> Option<&FormPart> {
        self.parts.iter().find(|p| p.name == name)
    }

    /// A named text field, trimmed. Empty values count as absent.
    pub fn text(&self, name: &str) -> Option<String> {
        self.part(name)
            .map(|p| String::from_utf8_lossy(&p.bytes).trim().to_string())
            .filter(|s| !s.is_empty())
    }

    /// The `file` part, which must carry a filename and at least one byte.
    pub fn file(&self) -> AppResult<(&str, &[u8])> {
        let part = self
            .part("file")
            .ok_or_else(|| AppError::Validation("Missing file".to_string()))?;
        let filename = part
            .filename
            .as_deref()
            .filter(|f| !f.is_empty())
            .ok_or_else(|| AppError::Validation("Missing file name".to_string()))?;
        if part.bytes.is_empty() {
            return Err(AppError::Validation("File is empty".to_string()));
        }
        Ok((filename, &part.bytes))
    }
}

pub async fn read_form(mut payload: Multipart, max_bytes: usize) -> AppResult<Form> {
    let mut form = Form::default();
    let mut total = 0usize;

    while let Some(item) = payload.next().await {
        let mut field = item?;
        let (name, filename) = match field.content_disposition() {
            Some(cd) => (
                cd.get_name().unwrap_or_default().to_string(),
                cd.get_filename().map(str::to_string),
            ),
            None => (String::new(), None),
        };

        let mut bytes = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk?;
            total += chunk.len();
            if total > max_bytes {
                return Err(AppError::Validation(format!(
                    "Upload exceeds the limit of {max_bytes} bytes"
                )));
            }
            bytes.extend_from_slice(&chunk);
        }
        form.parts.push(FormPart { name, filename, bytes });
    }
    Ok(form)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(parts: Vec<FormPart>) -> Form {
        Form { parts }
    }

    #[test]
    fn file_part_must_be_named_and_non_empty() {
        let empty = form(vec![FormPart {
            name: "file".into(),
            filename: Some("r.csv".into()),
            bytes: vec![],
        }]);
        assert!(matches!(empty.file(), Err(AppError::Validation(_))));
        assert!(matches!(Form::default().file(), Err(AppError::Validation(_))));

        let ok = form(vec![
            FormPart {
                name: "name".into(),
                filename: None,
                bytes: b"  Diploma ".to_vec(),
            },
            FormPart {
                name: "file".into(),
                filename: Some("r.csv".into()),
                bytes: b"name\nA\n".to_vec(),
            },
        ]);
        assert_eq!(ok.file().unwrap().0, "r.csv");
        assert_eq!(ok.text("name").as_deref(), Some("Diploma"));
        assert_eq!(ok.text("missing"), None);
    }
}
