use orbis_common::block::Block;
use orbis_common::utils::NodeId;
use orbis_common::vote::VoteData;

/// Inbound events consumed by the maestro loop.
///
/// The transport layer (or the in-memory loopback in tests) translates wire
/// messages into these before handing them to the runtime.
#[derive(Debug, Clone)]
pub enum NodeEvent {
    Proposal {
        block: Block,
        proposer: NodeId,
        term: u64,
    },
    Vote(VoteData),
    Heartbeat {
        from: NodeId,
        term: u64,
    },
    Shutdown,
}
