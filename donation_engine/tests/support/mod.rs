//! A scriptable, in-memory payment processor for the engine tests.
#![allow(dead_code)]
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use donation_engine::traits::{
    CapturedPayment,
    OrderRequest,
    PaymentHandle,
    PaymentProcessor,
    ProcessorError,
    ProcessorOrder,
    ProcessorQrCode,
    QrCodeRequest,
};
use dps_common::Paise;

#[derive(Debug, Default)]
struct StubState {
    next_id: u64,
    fail_orders: bool,
    fail_qr_codes: bool,
    fail_polls: bool,
    resolved_uri: Option<String>,
    captured: HashMap<String, CapturedPayment>,
    qr_requests: Vec<QrCodeRequest>,
}

#[derive(Debug, Clone, Default)]
pub struct StubProcessor {
    state: Arc<Mutex<StubState>>,
}

impl StubProcessor {
    pub fn fail_orders(&self) {
        self.state.lock().unwrap().fail_orders = true;
    }

    pub fn fail_qr_codes(&self) {
        self.state.lock().unwrap().fail_qr_codes = true;
    }

    pub fn fail_polls(&self) {
        self.state.lock().unwrap().fail_polls = true;
    }

    pub fn resolve_uris_to(&self, uri: &str) {
        self.state.lock().unwrap().resolved_uri = Some(uri.to_string());
    }

    /// Records a captured payment against an order, QR code or payment id.
    pub fn capture(&self, reference: &str, payment_id: &str, amount: Paise) {
        let payment = CapturedPayment { id: payment_id.to_string(), amount };
        self.state.lock().unwrap().captured.insert(reference.to_string(), payment);
    }

    pub fn qr_requests(&self) -> Vec<QrCodeRequest> {
        self.state.lock().unwrap().qr_requests.clone()
    }

    fn next_id(&self) -> u64 {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        state.next_id
    }
}

impl PaymentProcessor for StubProcessor {
    fn key_id(&self) -> String {
        "rzp_test_stub".to_string()
    }

    async fn create_order(&self, request: OrderRequest) -> Result<ProcessorOrder, ProcessorError> {
        if self.state.lock().unwrap().fail_orders {
            return Err(ProcessorError::Unavailable("stub refuses orders".into()));
        }
        let id = format!("order_stub{}", self.next_id());
        Ok(ProcessorOrder { id, amount: request.amount, currency: request.currency })
    }

    async fn create_qr_code(&self, request: QrCodeRequest) -> Result<ProcessorQrCode, ProcessorError> {
        if self.state.lock().unwrap().fail_qr_codes {
            return Err(ProcessorError::Rejected { status: 400, message: "stub refuses QR codes".into() });
        }
        let n = self.next_id();
        self.state.lock().unwrap().qr_requests.push(request);
        Ok(ProcessorQrCode { id: format!("qr_stub{n}"), image_url: format!("https://rzp.io/i/stub{n}"), payment_uri: None })
    }

    async fn resolve_payment_uri(&self, _image_url: &str) -> Option<String> {
        self.state.lock().unwrap().resolved_uri.clone()
    }

    async fn fetch_captured_payment(&self, handle: &PaymentHandle) -> Result<Option<CapturedPayment>, ProcessorError> {
        let state = self.state.lock().unwrap();
        if state.fail_polls {
            return Err(ProcessorError::Unavailable("stub is down".into()));
        }
        Ok(state.captured.get(handle.id()).cloned())
    }
}
