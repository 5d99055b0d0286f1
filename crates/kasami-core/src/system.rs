//! System construction.

use crate::{
    config::SystemConfig, error::ProcessError, process::Process, token::Token, types::ProcessId,
};

/// Create the processes of a system, indexed by id.
///
/// The single token starts with `LN` all zero and an empty queue at
/// `config.initial_holder`.
///
/// # Errors
///
/// Returns [`ProcessError::InvalidConfig`] if the configuration fails
/// [`SystemConfig::validate`].
pub fn create_system(config: &SystemConfig) -> Result<Vec<Process>, ProcessError> {
    config.validate()?;

    let n = config.process_count;
    ProcessId::all(n)
        .map(|id| {
            let token = (id == config.initial_holder).then(|| Token::new(n));
            Process::new(id, n, config.process.clone(), token)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_starts_at_holder() {
        let config = SystemConfig::new(4).with_initial_holder(ProcessId::new(2));
        let procs = create_system(&config).expect("valid config");

        assert_eq!(procs.len(), 4);
        let holders: Vec<_> = procs.iter().filter(|p| p.holds_token()).map(Process::id).collect();
        assert_eq!(holders, vec![ProcessId::new(2)]);

        let token = procs[2].token().expect("holder");
        assert_eq!(token.grants(), &[0, 0, 0, 0]);
        assert_eq!(token.pending().len(), 0);
    }

    #[test]
    fn processes_are_indexed_by_id() {
        let procs = create_system(&SystemConfig::new(3)).expect("valid config");
        for (i, proc) in procs.iter().enumerate() {
            assert_eq!(proc.id().index(), i);
            assert_eq!(proc.process_count(), 3);
        }
    }

    #[test]
    fn rejects_invalid_config() {
        assert!(matches!(create_system(&SystemConfig::new(0)), Err(ProcessError::InvalidConfig(_))));
    }
}
