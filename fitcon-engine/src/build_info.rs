//! Build identification stamped by build.rs

pub const GIT_HASH: &str = env!("GIT_HASH");
pub const BUILD_TIMESTAMP: &str = env!("BUILD_TIMESTAMP");
pub const BUILD_PROFILE: &str = env!("BUILD_PROFILE");

/// Startup banner line, e.g. `Starting fitcon-qa v0.1.0 [1a2b3c4d] built ... (release)`
pub fn banner(binary: &str, version: &str) -> String {
    format!(
        "Starting {} v{} [{}] built {} ({})",
        binary, version, GIT_HASH, BUILD_TIMESTAMP, BUILD_PROFILE
    )
}
