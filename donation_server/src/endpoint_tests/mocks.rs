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
use mockall::mock;

mock! {
    pub Processor {}
    impl PaymentProcessor for Processor {
        fn key_id(&self) -> String;
        async fn create_order(&self, request: OrderRequest) -> Result<ProcessorOrder, ProcessorError>;
        async fn create_qr_code(&self, request: QrCodeRequest) -> Result<ProcessorQrCode, ProcessorError>;
        async fn resolve_payment_uri(&self, image_url: &str) -> Option<String>;
        async fn fetch_captured_payment(&self, handle: &PaymentHandle) -> Result<Option<CapturedPayment>, ProcessorError>;
    }
}
