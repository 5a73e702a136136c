//! Scan session for the browser.
//!
//! Drives the shared session state machine on the JS event loop: the
//! extraction runs as a promise and the credential reselect signal is a
//! `setTimeout` that reset and new scans clear.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use js_sys::{Function, Promise};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::future_to_promise;

use receipt_core::{
    encode, ExtractionClient, FetchBackend, HistoryBrowser, HistoryStore, ImageFile, Locale,
    SessionMachine, SlotHistory, StaticCredential, Ticket, VisionBackend,
};

use crate::{image_file, js_error, LocalStorageSlot};

const DEFAULT_RESELECT_DELAY_MS: i32 = 2000;

struct PendingReselect {
    handle: i32,
    _callback: Closure<dyn FnMut()>,
}

struct Scanner<B: VisionBackend, H: HistoryStore> {
    client: ExtractionClient<B>,
    machine: RefCell<SessionMachine>,
    history: RefCell<H>,
    reselect_delay_ms: Cell<i32>,
    on_reselect: RefCell<Option<Function>>,
    pending: RefCell<Option<PendingReselect>>,
}

impl<B, H> Scanner<B, H>
where
    B: VisionBackend + 'static,
    H: HistoryStore + 'static,
{
    fn new(client: ExtractionClient<B>, history: H, locale: Locale) -> Rc<Self> {
        Rc::new(Self {
            client,
            machine: RefCell::new(SessionMachine::new(locale)),
            history: RefCell::new(history),
            reselect_delay_ms: Cell::new(DEFAULT_RESELECT_DELAY_MS),
            on_reselect: RefCell::new(None),
            pending: RefCell::new(None),
        })
    }

    fn scan(this: &Rc<Self>, image: ImageFile) -> Result<Promise, JsValue> {
        let preview = encode(&image).data_uri();
        let ticket = this.machine.borrow_mut().begin(preview).map_err(js_error)?;
        this.cancel_reselect();

        let this = Rc::clone(this);
        Ok(future_to_promise(async move {
            let outcome = this.client.extract(&image).await;

            let completion = {
                let mut history = this.history.borrow_mut();
                this.machine
                    .borrow_mut()
                    .finish(&ticket, outcome, &mut *history)
                    .map_err(js_error)?
            };

            if let Some(e) = &completion.history_error {
                web_sys::console::warn_1(&JsValue::from_str(&format!(
                    "scan not saved to history: {}",
                    e
                )));
            }
            if let Some(ticket) = completion.reselect {
                Self::schedule_reselect(&this, ticket)?;
            }

            serde_wasm_bindgen::to_value(&completion.state).map_err(js_error)
        }))
    }

    fn reset(&self) {
        self.cancel_reselect();
        self.machine.borrow_mut().reset();
    }

    fn schedule_reselect(this: &Rc<Self>, ticket: Ticket) -> Result<(), JsValue> {
        let window = web_sys::window().ok_or_else(|| js_error("no window"))?;
        let scanner = Rc::downgrade(this);

        let callback = Closure::<dyn FnMut()>::new(move || {
            let Some(scanner) = scanner.upgrade() else {
                return;
            };
            if !ticket.is_current() {
                return;
            }
            let listener = scanner.on_reselect.borrow().clone();
            if let Some(listener) = listener {
                if let Err(e) = listener.call0(&JsValue::NULL) {
                    web_sys::console::error_1(&e);
                }
            }
        });

        let handle = window.set_timeout_with_callback_and_timeout_and_arguments_0(
            callback.as_ref().unchecked_ref(),
            this.reselect_delay_ms.get(),
        )?;
        *this.pending.borrow_mut() = Some(PendingReselect {
            handle,
            _callback: callback,
        });
        Ok(())
    }

    fn cancel_reselect(&self) {
        let pending = self.pending.borrow_mut().take();
        if let Some(pending) = pending {
            if let Some(window) = web_sys::window() {
                window.clear_timeout_with_handle(pending.handle);
            }
        }
    }
}

/// Receipt scan session for browser use.
///
/// One scan at a time: `scan` throws synchronously while a scan is in
/// flight. Successful scans are saved to the `localStorage` history. After
/// the key is rejected the `on_reselect` callback fires once, unless the
/// session is reset or a new scan starts first; the host then asks for a new
/// key and creates a new scanner with it.
#[wasm_bindgen]
pub struct ReceiptScanner {
    inner: Rc<Scanner<FetchBackend, SlotHistory<LocalStorageSlot>>>,
}

#[wasm_bindgen]
impl ReceiptScanner {
    /// Create an idle scanner.
    #[wasm_bindgen(constructor)]
    pub fn new(
        api_key: Option<String>,
        locale: Option<String>,
        base_url: Option<String>,
    ) -> Result<ReceiptScanner, JsValue> {
        let locale = locale
            .as_deref()
            .and_then(Locale::from_tag)
            .unwrap_or_default();
        let backend = match base_url {
            Some(url) => FetchBackend::new().with_base_url(url),
            None => FetchBackend::new(),
        };
        let client = ExtractionClient::new(backend, StaticCredential(api_key));
        let history = SlotHistory::open(LocalStorageSlot).map_err(js_error)?;

        Ok(Self {
            inner: Scanner::new(client, history, locale),
        })
    }

    /// Delay in milliseconds between a rejected key and `on_reselect`.
    #[wasm_bindgen]
    pub fn set_reselect_delay(&self, delay_ms: u32) {
        let delay = i32::try_from(delay_ms).unwrap_or(i32::MAX);
        self.inner.reselect_delay_ms.set(delay);
    }

    /// Callback raised when the API key needs to be selected again.
    #[wasm_bindgen]
    pub fn on_reselect(&self, callback: Option<Function>) {
        *self.inner.on_reselect.borrow_mut() = callback;
    }

    /// Scan an image. Resolves to the final session state.
    ///
    /// The promise rejects if the session was reset before the response
    /// arrived; the response is then discarded.
    #[wasm_bindgen]
    pub fn scan(&self, bytes: Vec<u8>, mime_type: &str) -> Result<Promise, JsValue> {
        Scanner::scan(&self.inner, image_file(bytes, mime_type))
    }

    /// Return to idle and cancel a pending reselect callback.
    #[wasm_bindgen]
    pub fn reset(&self) {
        self.inner.reset();
    }

    /// Current session state, `{ state: "idle" | "loading" | "result" | "failed", ... }`.
    #[wasm_bindgen]
    pub fn state(&self) -> Result<JsValue, JsValue> {
        serde_wasm_bindgen::to_value(self.inner.machine.borrow().state()).map_err(js_error)
    }

    /// History entries, newest first.
    #[wasm_bindgen]
    pub fn entries(&self) -> Result<JsValue, JsValue> {
        let locale = self.inner.machine.borrow().locale();
        let history = self.inner.history.borrow();
        let entries = HistoryBrowser::over(&*history, locale).entries();
        serde_wasm_bindgen::to_value(&entries).map_err(js_error)
    }

    /// Full history record by id, or `null`.
    #[wasm_bindgen]
    pub fn get(&self, id: &str) -> Result<JsValue, JsValue> {
        let locale = self.inner.machine.borrow().locale();
        let history = self.inner.history.borrow();
        match HistoryBrowser::over(&*history, locale).get(id) {
            Some(record) => serde_wasm_bindgen::to_value(record).map_err(js_error),
            None => Ok(JsValue::NULL),
        }
    }
}
