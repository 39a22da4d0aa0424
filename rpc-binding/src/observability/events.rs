//! Canonical structured event names used across `rpc-binding`.

// Export and listening-endpoint events.
pub const EXPORT_OK: &str = "export_ok";
pub const EXPORT_REPLACED: &str = "export_replaced";
pub const EXPORT_ROLLBACK: &str = "export_rollback";
pub const UNEXPORT_OK: &str = "unexport_ok";
pub const UNEXPORT_SKIPPED_REPLACED: &str = "unexport_skipped_replaced";
pub const STUB_METHODS_RECORDED: &str = "stub_methods_recorded";
pub const STUB_METHODS_MISSING: &str = "stub_methods_missing";
pub const SERVER_BIND_OK: &str = "server_bind_ok";
pub const SERVER_BIND_FAILED: &str = "server_bind_failed";
pub const SERVER_RESET: &str = "server_reset";
pub const SERVER_REPLACE_CLOSED: &str = "server_replace_closed";
pub const SERVER_SKIPPED_NOT_SERVER: &str = "server_skipped_not_server";

// Client connection events.
pub const REFER_OK: &str = "refer_ok";
pub const CLIENT_CONNECT_OK: &str = "client_connect_ok";
pub const CLIENT_CONNECT_FAILED: &str = "client_connect_failed";
pub const LAZY_CLIENT_CREATE: &str = "lazy_client_create";
pub const LAZY_CLIENT_CONNECT: &str = "lazy_client_connect";
pub const LAZY_CLIENT_CLOSE_FAILED: &str = "lazy_client_close_failed";
pub const SHARED_CLIENT_CREATE: &str = "shared_client_create";
pub const SHARED_CLIENT_REUSE: &str = "shared_client_reuse";
pub const SHARED_CLIENT_EVICT_STALE: &str = "shared_client_evict_stale";
pub const SHARED_CLIENT_RELEASE: &str = "shared_client_release";
pub const SHARED_CLIENT_CLOSE: &str = "shared_client_close";
pub const SHARED_CLIENT_CLOSE_FAILED: &str = "shared_client_close_failed";
pub const SHARED_CLIENT_RELEASE_AFTER_CLOSE: &str = "shared_client_release_after_close";
pub const GHOST_CLIENT_INSTALL: &str = "ghost_client_install";
pub const GHOST_CLIENT_REMOVE: &str = "ghost_client_remove";
pub const GHOST_CLIENT_REQUEST: &str = "ghost_client_request";
pub const DEDICATED_CLIENT_CLOSE_FAILED: &str = "dedicated_client_close_failed";
pub const INVOKER_DESTROY: &str = "invoker_destroy";

// Inbound dispatch events.
pub const DISPATCH_RECEIVE: &str = "dispatch_receive";
pub const DISPATCH_SERVICE_NOT_FOUND: &str = "dispatch_service_not_found";
pub const DISPATCH_CALLBACK_METHOD_REJECTED: &str = "dispatch_callback_method_rejected";
pub const DISPATCH_STUB_METHOD_REJECTED: &str = "dispatch_stub_method_rejected";
pub const DISPATCH_MALFORMED: &str = "dispatch_malformed";
pub const DISPATCH_LIFECYCLE_EVENT: &str = "dispatch_lifecycle_event";
pub const DISPATCH_LIFECYCLE_EVENT_FAILED: &str = "dispatch_lifecycle_event_failed";
pub const CHANNEL_DISCONNECTED: &str = "channel_disconnected";

// Shutdown events.
pub const SHUTDOWN_START: &str = "shutdown_start";
pub const SHUTDOWN_CLOSE_OK: &str = "shutdown_close_ok";
pub const SHUTDOWN_CLOSE_FAILED: &str = "shutdown_close_failed";
pub const SHUTDOWN_OK: &str = "shutdown_ok";
pub const SHUTDOWN_REPEATED: &str = "shutdown_repeated";
