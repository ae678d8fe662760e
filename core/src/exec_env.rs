use std::collections::HashMap;

/// Environment for a child process: the agent's own environment with the
/// request's overrides applied on top.
pub fn create_env(overrides: Option<&HashMap<String, String>>) -> HashMap<String, String> {
    create_env_from_vars(std::env::vars(), overrides)
}

fn create_env_from_vars<I>(vars: I, overrides: Option<&HashMap<String, String>>) -> HashMap<String, String>
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut env: HashMap<String, String> = vars.into_iter().collect();
    if let Some(overrides) = overrides {
        env.extend(
            overrides
                .iter()
                .map(|(key, value)| (key.clone(), value.clone())),
        );
    }
    env
}
