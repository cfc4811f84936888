//! Orientation HUD – one status line per second while the demo runs.

use colored::Colorize;
use rdk_types::{MagicState, SessionPhase};

/// Frame statistics shown next to the orientation readout.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameStats {
    pub frames: u64,
    pub fps: f32,
    pub anchors_applied: usize,
    pub anchors_total: usize,
}

/// Render one HUD line for the current magic-window state.
///
/// `None` means no magic-window backend is registered.
pub fn render(state: Option<&MagicState>, stats: FrameStats) -> String {
    let Some(state) = state else {
        return format!("  {} {}", "◌".dimmed(), "no magic-window backend".red());
    };

    let permission = if state.permission_granted {
        "granted".green()
    } else if state.phase == SessionPhase::PermissionDeniedPendingGesture {
        "waiting for tap".yellow()
    } else {
        "denied".red()
    };
    let anchored = if state.has_initial_orientation {
        "yes".green()
    } else {
        "no".yellow()
    };
    let o = state.smoothed;

    format!(
        "  {} perm {} │ anchored {} │ α {:>6.1}° β {:>6.1}° γ {:>6.1}° │ {} │ frame {} @ {:>5.1} fps │ anchors {}/{}",
        phase_marker(state.phase),
        permission,
        anchored,
        o.alpha,
        o.beta,
        o.gamma,
        phase_label(state.phase).dimmed(),
        stats.frames,
        stats.fps,
        stats.anchors_applied,
        stats.anchors_total,
    )
}

fn phase_marker(phase: SessionPhase) -> colored::ColoredString {
    match phase {
        SessionPhase::Tracking => "●".green(),
        SessionPhase::PassthroughOnly => "●".cyan(),
        SessionPhase::PermissionDeniedPendingGesture | SessionPhase::AwaitingPermission => {
            "●".yellow()
        }
        _ => "●".dimmed(),
    }
}

/// Short human-readable phase name.
pub fn phase_label(phase: SessionPhase) -> &'static str {
    match phase {
        SessionPhase::Uninitialized => "uninitialized",
        SessionPhase::AcquiringMedia => "acquiring camera",
        SessionPhase::AwaitingPermission => "awaiting permission",
        SessionPhase::PermissionGranted => "permission granted",
        SessionPhase::PermissionDeniedPendingGesture => "pending gesture",
        SessionPhase::Tracking => "tracking",
        SessionPhase::PassthroughOnly => "passthrough only",
        SessionPhase::Disposed => "disposed",
    }
}
