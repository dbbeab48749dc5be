use super::object_url::{Blob, ObjectUrlRegistry};
use crate::services::mime;
use crate::types::{AssetError, AssetResult};
use base64::Engine;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

/// Lifecycle of the object URL a record may own.
#[derive(Debug)]
enum HandleState {
    Unallocated,
    Live(Arc<str>),
    Released,
}

/// One file of a pack, with lazily built views of its payload.
///
/// The MIME type is fixed at construction from the original entry path.
/// Text and data URL views are computed on first access and kept for the
/// lifetime of the record. The object URL handle is owned exclusively by the
/// record and released through [`AssetRecord::release`].
#[derive(Debug)]
pub struct AssetRecord {
    path: String,
    mime: &'static str,
    payload: Arc<[u8]>,
    text: OnceLock<AssetResult<Arc<str>>>,
    data_url: OnceLock<Arc<str>>,
    handle: Mutex<HandleState>,
}

impl AssetRecord {
    pub fn new(path: impl Into<String>, payload: Vec<u8>) -> Self {
        let path = path.into();
        Self {
            mime: mime::resolve(&path),
            path,
            payload: Arc::from(payload),
            text: OnceLock::new(),
            data_url: OnceLock::new(),
            handle: Mutex::new(HandleState::Unallocated),
        }
    }

    /// Archive path this record was built from.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn mime(&self) -> &'static str {
        self.mime
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn blob(&self) -> Blob {
        Blob {
            data: Arc::clone(&self.payload),
            mime: self.mime,
        }
    }

    pub fn is_text_ready(&self) -> bool {
        self.text.get().is_some()
    }

    pub fn is_data_url_ready(&self) -> bool {
        self.data_url.get().is_some()
    }

    /// Payload decoded as UTF-8, with a leading BOM stripped.
    pub fn text(&self) -> AssetResult<Arc<str>> {
        self.text
            .get_or_init(|| decode_utf8(&self.path, &self.payload))
            .clone()
    }

    /// `data:<mime>;base64,<payload>`
    pub fn data_url(&self) -> Arc<str> {
        self.data_url
            .get_or_init(|| {
                let encoded = base64::engine::general_purpose::STANDARD.encode(&self.payload);
                Arc::from(format!("data:{};base64,{}", self.mime, encoded))
            })
            .clone()
    }

    /// Object URL for this record, allocated in `registry` on first call.
    ///
    /// Returns `None` once the record has been released; a released record
    /// never allocates again.
    pub fn object_url(&self, registry: &ObjectUrlRegistry) -> Option<Arc<str>> {
        let mut handle = self.handle.lock().unwrap_or_else(PoisonError::into_inner);
        match &*handle {
            HandleState::Live(url) => return Some(Arc::clone(url)),
            HandleState::Released => return None,
            HandleState::Unallocated => {}
        }

        let url: Arc<str> = Arc::from(registry.create(self.blob()));
        *handle = HandleState::Live(Arc::clone(&url));
        Some(url)
    }

    /// Revoke the record's object URL, if it holds one, and forbid new ones.
    ///
    /// Returns `true` only for the call that actually revoked a live handle.
    pub fn release(&self, registry: &ObjectUrlRegistry) -> bool {
        let mut handle = self.handle.lock().unwrap_or_else(PoisonError::into_inner);
        let previous = std::mem::replace(&mut *handle, HandleState::Released);
        match previous {
            HandleState::Live(url) => registry.revoke(&url),
            HandleState::Unallocated | HandleState::Released => false,
        }
    }
}

fn decode_utf8(path: &str, payload: &[u8]) -> AssetResult<Arc<str>> {
    let body = match encoding_rs::Encoding::for_bom(payload) {
        Some((encoding, bom_len)) if encoding == encoding_rs::UTF_8 => &payload[bom_len..],
        _ => payload,
    };

    encoding_rs::UTF_8
        .decode_without_bom_handling_and_without_replacement(body)
        .map(|text| Arc::from(&*text))
        .ok_or_else(|| AssetError::TextDecode(format!("{path} is not valid UTF-8")))
}
