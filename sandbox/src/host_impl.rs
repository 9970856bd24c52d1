//! Per-run state held in the Wasmtime Store.
//!
//! `HostState` combines the injected host services (network transport and
//! environment), the guest's filesystem view and the boundary arena into the
//! single struct that lives inside `Store<HostState>` for one guest run. It
//! implements `HostApi`; the linker only decodes and marshals.

use std::sync::Arc;

use wasmtime::{StoreLimits, StoreLimitsBuilder};

use zina_hostapi::{
    HostApi, HostEnvironment, HostError, HttpTransport, MountOutcome, NativeEnvironment,
    ReadNotification, RequestDescriptor, ResponseEnvelope,
};

use crate::config::SandboxConfig;
use crate::error::SandboxError;
use crate::http::ReqwestTransport;
use crate::memory::{BoundaryArena, PAGE_SIZE};
use crate::vfs::{MountState, VirtualFs};

/// Services the host offers the guest, injected at startup.
#[derive(Clone)]
pub struct HostServices {
    pub transport: Arc<dyn HttpTransport>,
    pub environment: Arc<dyn HostEnvironment>,
}

impl HostServices {
    pub fn new(transport: Arc<dyn HttpTransport>, environment: Arc<dyn HostEnvironment>) -> Self {
        Self {
            transport,
            environment,
        }
    }

    /// Production services: blocking reqwest transport, filesystem rooted at
    /// the working directory.
    pub fn native(config: &SandboxConfig) -> Result<Self, SandboxError> {
        let transport = ReqwestTransport::new(&config.http)
            .map_err(|e| SandboxError::HostSetup(e.to_string()))?;
        let environment = NativeEnvironment::current_dir()
            .map_err(|e| SandboxError::HostSetup(format!("working directory: {}", e)))?;
        Ok(Self::new(Arc::new(transport), Arc::new(environment)))
    }
}

/// Per-run mutable state held in the Wasmtime `Store`.
pub struct HostState {
    services: HostServices,
    /// Guest filesystem view.
    pub vfs: VirtualFs,
    /// Host-written buffers handed to the guest.
    pub arena: BoundaryArena,
    /// Longest string decoded from guest memory.
    pub max_string_len: usize,
    pub enable_guest_logs: bool,
    /// Wasmtime resource limiter (memory ceiling).
    pub limits: StoreLimits,
}

impl HostState {
    pub fn new(services: HostServices, config: &SandboxConfig) -> Self {
        let limits = StoreLimitsBuilder::new()
            .memory_size(config.max_memory_pages as usize * PAGE_SIZE)
            .build();
        Self {
            services,
            vfs: VirtualFs::new(),
            // Runtime sets the real region after instantiation.
            arena: BoundaryArena::new(0, 0),
            max_string_len: config.max_string_len,
            enable_guest_logs: config.enable_guest_logs,
            limits,
        }
    }

    pub fn mount_state(&self) -> &MountState {
        self.vfs.state()
    }
}

impl HostApi for HostState {
    fn http_request(&mut self, request: &RequestDescriptor) -> ResponseEnvelope {
        tracing::debug!(method = %request.method, url = %request.url, "bridged request");
        match self.services.transport.execute(request) {
            Ok(envelope) => {
                tracing::debug!(
                    status = envelope.status_code,
                    body_len = envelope.body.len(),
                    "bridged request completed"
                );
                envelope
            }
            Err(e) => {
                tracing::warn!(error = %e, "bridged request failed");
                ResponseEnvelope::network_failure()
            }
        }
    }

    fn make_read_notification(&self) -> ReadNotification {
        ReadNotification::now()
    }

    fn mount_filesystem(&mut self) -> Result<MountOutcome, HostError> {
        let capability = self.services.environment.filesystem();
        let outcome = self.vfs.mount(capability)?;
        match &outcome {
            MountOutcome::Mounted(desc) => tracing::info!(
                root = %desc.host_root.display(),
                mount_point = desc.mount_point,
                "filesystem mounted"
            ),
            MountOutcome::AlreadyMounted(desc) => tracing::debug!(
                mount_point = desc.mount_point,
                "filesystem already mounted"
            ),
            MountOutcome::Skipped => {
                tracing::info!("no native filesystem, mount skipped")
            }
        }
        Ok(outcome)
    }

    fn read_file(&self, virtual_path: &str) -> Result<Vec<u8>, HostError> {
        self.vfs.read(virtual_path)
    }

    fn write_file(&self, virtual_path: &str, data: &[u8]) -> Result<(), HostError> {
        self.vfs.write(virtual_path, data)
    }

    fn unlink_file(&self, virtual_path: &str) -> Result<(), HostError> {
        self.vfs.unlink(virtual_path)
    }

    fn log(&self, level: i32, message: &str) {
        if !self.enable_guest_logs {
            return;
        }
        match level {
            0 => tracing::error!(target: "zina::guest", "{}", message),
            1 => tracing::warn!(target: "zina::guest", "{}", message),
            2 => tracing::info!(target: "zina::guest", "{}", message),
            3 => tracing::debug!(target: "zina::guest", "{}", message),
            _ => tracing::trace!(target: "zina::guest", "{}", message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use zina_hostapi::{RestrictedEnvironment, StaticTransport, StatusCode};

    fn state_with(transport: StaticTransport, environment: Arc<dyn HostEnvironment>) -> HostState {
        let services = HostServices::new(Arc::new(transport), environment);
        HostState::new(services, &SandboxConfig::default())
    }

    #[test]
    fn test_http_request_passes_envelope_through() {
        let transport = StaticTransport::new().respond("POST", "http://host/api", 200, "ok");
        let mut state = state_with(transport, Arc::new(RestrictedEnvironment));
        let req = RequestDescriptor::new("http://host/api", "POST", "{\"a\":1}").unwrap();
        let envelope = state.http_request(&req);
        assert_eq!(envelope, ResponseEnvelope::new(200, "ok"));
    }

    #[test]
    fn test_http_request_network_failure_is_envelope() {
        let mut state = state_with(StaticTransport::new(), Arc::new(RestrictedEnvironment));
        let req = RequestDescriptor::new("http://unreachable/", "GET", "").unwrap();
        let envelope = state.http_request(&req);
        assert_eq!(envelope.status_code, StatusCode::NetworkFailure.as_i32());
        assert!(envelope.body.is_empty());
    }

    #[test]
    fn test_notification_has_rr_cmd() {
        let state = state_with(StaticTransport::new(), Arc::new(RestrictedEnvironment));
        assert_eq!(state.make_read_notification().cmd, "rr");
    }

    #[test]
    fn test_mount_restricted_is_skipped() {
        let mut state = state_with(StaticTransport::new(), Arc::new(RestrictedEnvironment));
        assert_eq!(state.mount_filesystem().unwrap(), MountOutcome::Skipped);
        assert_eq!(state.mount_state(), &MountState::Skipped);
    }

    #[test]
    fn test_mount_native_then_file_access() {
        let dir = tempfile::tempdir().unwrap();
        let env = Arc::new(NativeEnvironment::new(dir.path()));
        let mut state = state_with(StaticTransport::new(), env);
        assert!(matches!(
            state.mount_filesystem().unwrap(),
            MountOutcome::Mounted(_)
        ));
        state.write_file("/axolotl/h_key", b"secret").unwrap();
        assert_eq!(state.read_file("/axolotl/h_key").unwrap(), b"secret");
        state.unlink_file("/axolotl/h_key").unwrap();
        assert!(!dir.path().join("h_key").exists());
    }

    #[test]
    fn test_native_services_build() {
        assert!(HostServices::native(&SandboxConfig::default()).is_ok());
    }

    #[test]
    fn test_mount_missing_root_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let env = Arc::new(NativeEnvironment::new(dir.path().join("gone")));
        let mut state = state_with(StaticTransport::new(), env);
        let err = state.mount_filesystem().unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(err, HostError::Mount(_)));
    }

    #[derive(Clone, Default)]
    struct LogSink(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for LogSink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    /// What a guest `log` call at info level writes to the host logger.
    fn guest_log_output(enable_guest_logs: bool) -> String {
        let config = SandboxConfig {
            enable_guest_logs,
            ..SandboxConfig::default()
        };
        let services = HostServices::new(
            Arc::new(StaticTransport::new()),
            Arc::new(RestrictedEnvironment),
        );
        let state = HostState::new(services, &config);

        let sink = LogSink::default();
        let writer = sink.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_max_level(tracing::Level::TRACE)
            .with_ansi(false)
            .finish();
        tracing::subscriber::with_default(subscriber, || state.log(2, "guest says hi"));

        let bytes = sink.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_guest_log_forwarded() {
        let output = guest_log_output(true);
        assert!(output.contains("guest says hi"), "{output}");
        assert!(output.contains("zina::guest"), "{output}");
        assert!(output.contains("INFO"), "{output}");
    }

    #[test]
    fn test_guest_log_dropped_when_disabled() {
        assert_eq!(guest_log_output(false), "");
    }
}
