mod candidate;
mod context;
mod election_state;
mod follower;
mod leader;
mod state_change_listener;
#[cfg(test)]
mod test_utils;

pub(crate) use context::RoleContext;
pub(crate) use election_state::ElectionConfig;
pub(crate) use election_state::ElectionState;
pub use leader::WriteError;
pub(crate) use state_change_listener::ElectionStateChangeListener;
pub(crate) use state_change_listener::ElectionStateSnapshot;
