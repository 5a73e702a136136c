//! WASM bindings for receipt scanning.
//!
//! [`ReceiptScanner`] runs whole scans from the browser: it calls the model
//! with `fetch`, tracks the session state and saves results to a history kept
//! in `localStorage`. The free functions expose the individual steps for front
//! ends that make the network call themselves.

#[cfg(target_arch = "wasm32")]
mod scanner;

use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;

use receipt_core::encoder::detect_mime_type;
use receipt_core::{
    build_request, classify_message, encode, ExtractedText, FailureKind, HistoryBrowser,
    HistoryError, HistorySlot, HistoryStore, ImageFile, Locale, ScanRecord, SlotHistory,
    HISTORY_SLOT,
};

#[cfg(target_arch = "wasm32")]
pub use scanner::ReceiptScanner;

/// Initialize panic hook for better error messages in console.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Version information.
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn js_error(err: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&err.to_string())
}

fn image_file(bytes: Vec<u8>, mime_type: &str) -> ImageFile {
    let mime_type = match mime_type.trim() {
        "" => detect_mime_type(None, &bytes),
        given => given.to_string(),
    };
    ImageFile::new(bytes, mime_type)
}

/// Encode image bytes as `{ data, mimeType }`.
///
/// An empty `mime_type` is sniffed from the bytes.
#[wasm_bindgen]
pub fn encode_image(bytes: Vec<u8>, mime_type: &str) -> Result<JsValue, JsValue> {
    let encoded = encode(&image_file(bytes, mime_type));
    serde_wasm_bindgen::to_value(&encoded).map_err(js_error)
}

/// `data:` URI for showing the image as a preview.
#[wasm_bindgen]
pub fn data_uri(bytes: Vec<u8>, mime_type: &str) -> String {
    encode(&image_file(bytes, mime_type)).data_uri()
}

/// JSON body of a `generateContent` call for this image.
#[wasm_bindgen]
pub fn build_request_body(bytes: Vec<u8>, mime_type: &str) -> Result<String, JsValue> {
    let request = build_request(&encode(&image_file(bytes, mime_type)));
    serde_json::to_string(&request).map_err(js_error)
}

/// Classify a provider error message: `"unauthorized"` or `"generic"`.
#[wasm_bindgen]
pub fn classify_error(message: &str) -> String {
    match classify_message(message) {
        FailureKind::Unauthorized => "unauthorized",
        _ => "generic",
    }
    .to_string()
}

/// Localized message for a failure kind such as `"empty_result"`.
#[wasm_bindgen]
pub fn failure_message(kind: &str, locale: &str) -> Option<String> {
    let kind: FailureKind = serde_json::from_value(serde_json::Value::from(kind)).ok()?;
    let locale = Locale::from_tag(locale).unwrap_or_default();
    Some(locale.failure_message(kind).to_string())
}

/// Write `text` to the system clipboard, verbatim.
#[wasm_bindgen]
pub async fn copy_text(text: String) -> Result<(), JsValue> {
    let window = web_sys::window().ok_or_else(|| js_error("no window"))?;
    let navigator = window.navigator();

    let clipboard = js_sys::Reflect::get(&navigator, &JsValue::from_str("clipboard"))?;
    if clipboard.is_undefined() {
        return Err(js_error("clipboard unavailable"));
    }
    let write_text: js_sys::Function =
        js_sys::Reflect::get(&clipboard, &JsValue::from_str("writeText"))?.dyn_into()?;
    let promise: js_sys::Promise = write_text
        .call1(&clipboard, &JsValue::from_str(&text))?
        .dyn_into()?;

    JsFuture::from(promise).await?;
    Ok(())
}

/// History slot backed by `window.localStorage`.
#[derive(Debug, Default)]
pub struct LocalStorageSlot;

impl LocalStorageSlot {
    fn storage() -> Result<web_sys::Storage, HistoryError> {
        web_sys::window()
            .ok_or_else(|| HistoryError::Storage("no window".to_string()))?
            .local_storage()
            .map_err(|e| HistoryError::Storage(format!("{:?}", e)))?
            .ok_or_else(|| HistoryError::Storage("localStorage unavailable".to_string()))
    }
}

impl HistorySlot for LocalStorageSlot {
    fn read(&self) -> Result<Option<String>, HistoryError> {
        Self::storage()?
            .get_item(HISTORY_SLOT)
            .map_err(|e| HistoryError::Storage(format!("{:?}", e)))
    }

    fn write(&mut self, contents: &str) -> Result<(), HistoryError> {
        Self::storage()?
            .set_item(HISTORY_SLOT, contents)
            .map_err(|e| HistoryError::Storage(format!("{:?}", e)))
    }
}

/// Scan history for browser use.
#[wasm_bindgen]
pub struct ReceiptHistory {
    history: SlotHistory<LocalStorageSlot>,
    locale: Locale,
}

#[wasm_bindgen]
impl ReceiptHistory {
    /// Load the history from `localStorage`.
    #[wasm_bindgen(constructor)]
    pub fn load(locale: Option<String>) -> Result<ReceiptHistory, JsValue> {
        let locale = locale
            .as_deref()
            .and_then(Locale::from_tag)
            .unwrap_or_default();
        let history = SlotHistory::open(LocalStorageSlot).map_err(js_error)?;
        Ok(Self { history, locale })
    }

    /// Save a completed scan and return its record.
    ///
    /// Blank text is rejected with the localized empty-result message. A
    /// failed write keeps the record for this page and is logged to the
    /// console.
    #[wasm_bindgen]
    pub fn append_scan(&mut self, text: &str, image_preview: &str) -> Result<JsValue, JsValue> {
        let text = ExtractedText::parse(text)
            .map_err(|e| js_error(self.locale.failure_message(e.kind())))?;
        let record = ScanRecord::new(text, image_preview);
        let output = serde_wasm_bindgen::to_value(&record).map_err(js_error)?;

        if let Err(e) = self.history.append(record) {
            web_sys::console::warn_1(&JsValue::from_str(&format!(
                "scan not saved to history: {}",
                e
            )));
        }

        Ok(output)
    }

    /// Entries for the history list, newest first.
    #[wasm_bindgen]
    pub fn entries(&self) -> Result<JsValue, JsValue> {
        let entries = HistoryBrowser::over(&self.history, self.locale).entries();
        serde_wasm_bindgen::to_value(&entries).map_err(js_error)
    }

    /// Full record by id, or `null`.
    #[wasm_bindgen]
    pub fn get(&self, id: &str) -> Result<JsValue, JsValue> {
        match HistoryBrowser::over(&self.history, self.locale).get(id) {
            Some(record) => serde_wasm_bindgen::to_value(record).map_err(js_error),
            None => Ok(JsValue::NULL),
        }
    }

    /// Number of saved scans.
    #[wasm_bindgen]
    pub fn len(&self) -> usize {
        self.history.len()
    }

    #[wasm_bindgen(js_name = isEmpty)]
    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }
}

#[cfg(all(test, target_arch = "wasm32"))]
mod tests {
    use super::*;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    fn clear_history() {
        LocalStorageSlot::storage()
            .unwrap()
            .remove_item(HISTORY_SLOT)
            .unwrap();
    }

    #[wasm_bindgen_test]
    fn test_classify_error() {
        assert_eq!(classify_error("Requested entity was not found."), "unauthorized");
        assert_eq!(classify_error("API key not valid. Please pass a valid API key."), "unauthorized");
        assert_eq!(classify_error("Internal error"), "generic");
    }

    #[wasm_bindgen_test]
    fn test_data_uri_sniffs_type() {
        let png = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
        assert!(data_uri(png, "").starts_with("data:image/png;base64,"));
        assert_eq!(data_uri(vec![1, 2, 3], "image/jpeg"), "data:image/jpeg;base64,AQID");
    }

    #[wasm_bindgen_test]
    fn test_build_request_body() {
        let body = build_request_body(vec![1, 2, 3], "image/jpeg").unwrap();
        assert!(body.contains(r#""inlineData":{"mimeType":"image/jpeg","data":"AQID"}"#));
        assert!(body.contains("Extract all text from this receipt."));
    }

    #[wasm_bindgen_test]
    fn test_failure_message() {
        assert_eq!(
            failure_message("empty_result", "en").as_deref(),
            Some("Failed to extract text from the image.")
        );
        assert_eq!(failure_message("nope", "en"), None);
    }

    #[wasm_bindgen_test]
    fn test_history_round_trip() {
        clear_history();

        let mut history = ReceiptHistory::load(None).unwrap();
        assert!(history.is_empty());
        history.append_scan("first", "data:image/png;base64,AA==").unwrap();
        history.append_scan("second", "data:image/png;base64,AA==").unwrap();

        let reopened = ReceiptHistory::load(Some("en".to_string())).unwrap();
        assert_eq!(reopened.len(), 2);
        let newest = reopened.history.load()[0].extracted_text().to_string();
        assert_eq!(newest, "second");

        clear_history();
    }

    #[wasm_bindgen_test]
    fn test_blank_scan_rejected() {
        clear_history();

        let mut history = ReceiptHistory::load(None).unwrap();
        assert!(history.append_scan("  \n ", "").is_err());
        assert!(history.is_empty());
    }
}
