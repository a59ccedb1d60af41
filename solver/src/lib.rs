//! Perfect-clear search core: move generation, pruning, the ordering
//! network, the iterative-deepening searcher, and the canonical sequence
//! enumeration with its on-disk codec.

pub mod codec;
pub mod features;
pub mod network;
pub mod placements;
pub mod pruner;
pub mod search;
pub mod sequence;
