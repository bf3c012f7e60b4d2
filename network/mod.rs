pub mod reader;
pub use reader::{
    NetworkError, ReactionNetwork, append_rearrangement_energy, read_reaction_network,
};
