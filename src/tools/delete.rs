use anyhow::{Context, Error};

use ioccc_remote::SubmitServer;
use ioccc_slot::Username;
use ioccc_store::CollectStore;

use crate::config::Config;
use crate::tools::opt::DeleteOpt;

pub fn main_delete(opt: DeleteOpt, config: &Config) -> Result<(), Error> {
    let store = opt.store.open(config)?;
    let server = opt.remote.server(config)?;
    delete(&store, &server, &opt.username, opt.unregister)
}

/// Remove the account of a contestant from the server. With `unregister` the contestant is also
/// forgotten by the registry, otherwise it can be provisioned again.
///
/// Accounts not in the registry are deleted anyway.
pub fn delete(
    store: &CollectStore,
    server: &SubmitServer,
    username: &Username,
    unregister: bool,
) -> Result<(), Error> {
    let mut registry = store.registry()?;
    server.delete_user(username)?;
    if unregister {
        if registry.remove(username).is_none() {
            warn!("{} is not registered", username);
        }
    } else if let Err(e) = registry.mark_deleted(username) {
        warn!("{:#}", e);
    }
    registry
        .save()
        .with_context(|| format!("Failed to save the deletion of {}", username))
}

#[cfg(test)]
mod tests {
    use ioccc_remote::mock::MockTransport;
    use ioccc_remote::{RemoteOutput, ServerLayout};
    use tempfile::TempDir;

    use super::*;
    use crate::tools::register::register;

    fn setup() -> (TempDir, CollectStore, MockTransport, SubmitServer) {
        let tmp = TempDir::new().unwrap();
        let store = CollectStore::open(tmp.path()).unwrap();
        let transport = MockTransport::default();
        let server = SubmitServer::new(transport.clone(), ServerLayout::default());
        (tmp, store, transport, server)
    }

    #[test]
    fn test_delete_keeps_registration() {
        let (_tmp, store, transport, server) = setup();
        let username = register(&store, "judge@example.com", None).unwrap();
        let mut registry = store.registry().unwrap();
        registry.mark_provisioned(&username).unwrap();
        registry.save().unwrap();

        delete(&store, &server, &username, false).unwrap();
        let commands = transport.commands_of("ioccc_passwd.py");
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0][commands[0].len() - 2..], ["-d".to_string(), username.to_string()]);
        let registry = store.registry().unwrap();
        assert!(!registry.get(&username).unwrap().provisioned);
    }

    #[test]
    fn test_delete_unregister() {
        let (_tmp, store, _transport, server) = setup();
        let username = register(&store, "judge@example.com", None).unwrap();
        delete(&store, &server, &username, true).unwrap();
        assert!(store.registry().unwrap().get(&username).is_none());
        assert!(register(&store, "judge@example.com", None).is_ok());
    }

    #[test]
    fn test_delete_failure_keeps_registry() {
        let (_tmp, store, transport, server) = setup();
        let username = register(&store, "judge@example.com", None).unwrap();
        transport.respond("ioccc_passwd.py", RemoteOutput::failed(1, "no such user"));
        assert!(delete(&store, &server, &username, true).is_err());
        assert!(store.registry().unwrap().get(&username).is_some());
    }
}
