use reportgen::ReportService;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub service: ReportService,
}

impl AppState {
    pub fn new(service: ReportService) -> Self {
        Self { service }
    }
}
