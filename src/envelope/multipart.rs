//! Multipart form submissions.
//!
//! A `meta` value carries the envelope metadata as a JSON string. The body
//! arrives either as a `body` part (file or value) or, for complex
//! submissions, as several file parts plus optional values. File parts of
//! a complex submission are keyed by file name, which must be unique.

use axum::extract::{FromRequest, Multipart};
use bytes::Bytes;

use crate::body::contents::from_bytes;
use crate::envelope::codec::{DecodeError, Envelope};
use crate::envelope::complex::ComplexPayload;
use crate::envelope::request::{Request, RequestBody};

const META_FIELD: &str = "meta";
const BODY_FIELD: &str = "body";

struct FilePart {
    field: String,
    file_name: String,
    data: Bytes,
}

#[derive(Default)]
struct Form {
    files: Vec<FilePart>,
    values: Vec<(String, Bytes)>,
}

impl Form {
    fn value(&self, name: &str) -> Option<&Bytes> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    fn take_value(&mut self, name: &str) -> Option<Bytes> {
        let idx = self.values.iter().position(|(n, _)| n == name)?;
        Some(self.values.remove(idx).1)
    }

    fn take_file(&mut self, field: &str) -> Option<FilePart> {
        let idx = self.files.iter().position(|f| f.field == field)?;
        Some(self.files.remove(idx))
    }

    /// More than one file, or a file alongside any value besides `meta`.
    fn is_complex(&self) -> bool {
        let extra_values = self.values.iter().any(|(n, _)| n != META_FIELD);
        self.files.len() > 1 || (!self.files.is_empty() && extra_values)
    }
}

pub(crate) async fn decode_multipart(req: axum::extract::Request) -> Result<Request, DecodeError> {
    let multipart = Multipart::from_request(req, &())
        .await
        .map_err(|e| DecodeError::Multipart(e.body_text()))?;
    let form = read_form(multipart).await?;
    from_form(form)
}

async fn read_form(mut multipart: Multipart) -> Result<Form, DecodeError> {
    let mut form = Form::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| DecodeError::Multipart(e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|e| DecodeError::Multipart(e.body_text()))?;

        match file_name {
            Some(file_name) => form.files.push(FilePart {
                field: name,
                file_name,
                data,
            }),
            None => form.values.push((name, data)),
        }
    }
    Ok(form)
}

fn from_form(mut form: Form) -> Result<Request, DecodeError> {
    let meta = form
        .value(META_FIELD)
        .filter(|m| !m.is_empty())
        .ok_or(DecodeError::MissingMeta)?;
    let envelope: Envelope = serde_json::from_slice(meta).map_err(DecodeError::InvalidMeta)?;

    if form.is_complex() {
        let mut payload = ComplexPayload::new(form.take_value(BODY_FIELD).unwrap_or_default());
        for part in form.files {
            let key = if part.file_name.is_empty() {
                part.field
            } else {
                part.file_name
            };
            if payload.files.contains_key(&key) {
                tracing::warn!(file = %key, "Duplicate file in multipart form submission");
                return Err(DecodeError::DuplicateFile(key));
            }
            payload.files.insert(key, from_bytes(part.data));
        }
        return Ok(envelope.into_request(RequestBody::Complex(payload)));
    }

    let body = match form.take_file(BODY_FIELD) {
        Some(part) => RequestBody::Stream(from_bytes(part.data)),
        None => match form.take_value(BODY_FIELD) {
            Some(v) => RequestBody::Bytes(v),
            None => return Err(DecodeError::MissingBody),
        },
    };
    Ok(envelope.into_request(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    const META: &str = r#"{"method":"POST","url":"/upload","params":{"header":{"x-trace":["1"]}}}"#;

    fn form(files: &[(&str, &str, &str)], values: &[(&str, &str)]) -> Form {
        Form {
            files: files
                .iter()
                .map(|(field, name, data)| FilePart {
                    field: field.to_string(),
                    file_name: name.to_string(),
                    data: Bytes::copy_from_slice(data.as_bytes()),
                })
                .collect(),
            values: values
                .iter()
                .map(|(n, v)| (n.to_string(), Bytes::copy_from_slice(v.as_bytes())))
                .collect(),
        }
    }

    #[tokio::test]
    async fn two_files_build_complex_payload() {
        let f = form(
            &[("a", "one.txt", "1"), ("b", "two.txt", "2")],
            &[("meta", META)],
        );
        let req = from_form(f).unwrap();
        assert_eq!(req.path, "/upload");
        assert_eq!(req.headers.get("X-Trace"), Some("1"));

        let RequestBody::Complex(mut payload) = req.body else {
            panic!("expected complex payload");
        };
        let mut out = String::new();
        payload
            .take_file("two.txt")
            .unwrap()
            .read_to_string(&mut out)
            .await
            .unwrap();
        assert_eq!(out, "2");
        assert!(payload.files.contains_key("one.txt"));
    }

    #[tokio::test]
    async fn single_file_is_plain_stream() {
        let f = form(&[("body", "data.json", r#"{"k":1}"#)], &[("meta", META)]);
        let req = from_form(f).unwrap();
        let RequestBody::Stream(mut s) = req.body else {
            panic!("expected stream body");
        };
        let mut out = String::new();
        s.read_to_string(&mut out).await.unwrap();
        assert_eq!(out, r#"{"k":1}"#);
    }

    #[test]
    fn file_with_extra_value_is_complex() {
        let f = form(
            &[("body", "data.bin", "x")],
            &[("meta", META), ("body", r#"{"k":2}"#)],
        );
        let req = from_form(f).unwrap();
        let RequestBody::Complex(payload) = req.body else {
            panic!("expected complex payload");
        };
        assert_eq!(payload.body, Bytes::from(r#"{"k":2}"#));
        assert!(payload.files.contains_key("data.bin"));
    }

    #[test]
    fn value_body_is_bytes() {
        let f = form(&[], &[("meta", META), ("body", r#"{"k":3}"#)]);
        let req = from_form(f).unwrap();
        assert!(matches!(req.body, RequestBody::Bytes(b) if b == Bytes::from(r#"{"k":3}"#)));
    }

    #[test]
    fn duplicate_file_names_are_rejected() {
        let f = form(
            &[("a", "same.txt", "1"), ("b", "same.txt", "2")],
            &[("meta", META)],
        );
        assert!(matches!(
            from_form(f),
            Err(DecodeError::DuplicateFile(name)) if name == "same.txt"
        ));
    }

    #[test]
    fn missing_meta_fails() {
        let f = form(&[("body", "a.txt", "x")], &[]);
        assert!(matches!(from_form(f), Err(DecodeError::MissingMeta)));
    }

    #[test]
    fn invalid_meta_fails() {
        let f = form(&[("body", "a.txt", "x")], &[("meta", "{")]);
        assert!(matches!(from_form(f), Err(DecodeError::InvalidMeta(_))));
    }

    #[test]
    fn missing_body_fails() {
        let f = form(&[("other", "a.txt", "x")], &[("meta", META)]);
        assert!(matches!(from_form(f), Err(DecodeError::MissingBody)));
    }
}
