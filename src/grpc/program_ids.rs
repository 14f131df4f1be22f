//! Program ids in the string form the subscription filter expects.

use crate::instr::SwapProgram;

pub fn get_program_ids_for_programs(programs: &[SwapProgram]) -> Vec<String> {
    let mut program_ids: Vec<String> = programs.iter().map(|p| p.program_id().to_string()).collect();
    program_ids.sort();
    program_ids.dedup();
    program_ids
}

/// Every supported swap program.
pub fn all_swap_program_ids() -> Vec<String> {
    get_program_ids_for_programs(&SwapProgram::ALL)
}
