//! Security review: maintenance checklist and CA installation instructions

mod checklist;
mod instructions;

pub use checklist::{
    AssessmentInput, ChecklistItem, ChecklistStatus, SecurityChecklist, ITEM_CIPHERS,
    ITEM_EXPIRATION, ITEM_HSTS, ITEM_KEYS, ITEM_PROTOCOLS,
};
pub use instructions::{all_install_instructions, install_instructions, InstallInstructions, Platform};
