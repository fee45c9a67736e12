/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Best-effort write-through of sessions to storage.
pub mod persistence;
/// Server-side timers driving the timed session phases.
pub mod phase_clock;
/// Public service for read-only session information.
pub mod public_service;
/// Eviction of finished and abandoned sessions.
pub mod session_reaper;
/// Session lifecycle: creation, joining, answering and host controls.
pub mod session_service;
/// Server-Sent Events message generation.
pub mod sse_events;
/// Server-Sent Events broadcasting service.
pub mod sse_service;
/// Storage connection supervisor toggling degraded mode.
pub mod storage_supervisor;
