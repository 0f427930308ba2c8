use crate::commitlog::Position;
use crate::transport::TransportPosition;
use std::convert::TryFrom;

// A leader's transport stream and the replicated log describe the same bytes from different
// origins. Within one leadership term they differ by a fixed delta:
//
//     transport = logical + delta
//
// The delta is fixed when the leader's term begins. Heartbeats carry both origins of the term so
// followers can derive it.

pub(crate) fn transport_to_logical(transport_position: TransportPosition, delta: i64) -> Position {
    checked_transport_to_logical(transport_position, delta).unwrap_or_else(|| {
        panic!(
            "Transport position {} maps outside the log with delta {}",
            transport_position, delta
        )
    })
}

pub(crate) fn logical_to_transport(logical_position: Position, delta: i64) -> TransportPosition {
    checked_logical_to_transport(logical_position, delta).unwrap_or_else(|| {
        panic!(
            "Logical position {} is not representable as a transport position with delta {}",
            logical_position, delta
        )
    })
}

pub(crate) fn transport_position_delta(transport_position: TransportPosition, logical_position: Position) -> i64 {
    checked_transport_position_delta(transport_position, logical_position).unwrap_or_else(|| {
        panic!(
            "No delta maps logical position {} onto transport position {}",
            logical_position, transport_position
        )
    })
}

// Checked forms, for positions that arrive off the wire.

pub(crate) fn checked_transport_to_logical(transport_position: TransportPosition, delta: i64) -> Option<Position> {
    let logical = transport_position.checked_sub(delta)?;
    u64::try_from(logical).ok()
}

pub(crate) fn checked_logical_to_transport(logical_position: Position, delta: i64) -> Option<TransportPosition> {
    i64::try_from(logical_position).ok()?.checked_add(delta)
}

pub(crate) fn checked_transport_position_delta(
    transport_position: TransportPosition,
    logical_position: Position,
) -> Option<i64> {
    transport_position.checked_sub(i64::try_from(logical_position).ok()?)
}
