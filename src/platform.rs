//! Facts about the invoking process and the host it runs on.
use crate::error::PreconditionError;
use crate::exec::Executor;
use crate::operations::password::Caller;
use crate::resources::error::ResourceError;

/// Identify the invoking user with `id -u` and `id -un`.
///
/// `sudo_user` is the `SUDO_USER` variable.  It is kept only when the tool
/// runs as root on behalf of someone other than root.
///
/// # Errors
///
/// Returns an error if `id` fails or prints a non-numeric uid.
pub fn current_caller(
    executor: &dyn Executor,
    sudo_user: Option<String>,
) -> Result<Caller, ResourceError> {
    let uid = executor.run("id", &["-u"])?.stdout;
    let uid = uid
        .trim()
        .parse::<u32>()
        .map_err(|e| ResourceError::InvalidState {
            resource: "id -u".to_string(),
            reason: format!("unexpected output '{}': {e}", uid.trim()),
        })?;
    let name = executor.run("id", &["-un"])?.stdout.trim().to_string();
    let sudo_user = sudo_user
        .map(|user| user.trim().to_string())
        .filter(|user| uid == 0 && !user.is_empty() && user != "root");
    Ok(Caller {
        uid,
        name,
        sudo_user,
    })
}

/// Fail unless `caller` is root.
///
/// # Errors
///
/// Returns [`PreconditionError::Forbidden`] for any other user.
pub fn require_operator(caller: &Caller) -> Result<(), PreconditionError> {
    if caller.is_operator() {
        Ok(())
    } else {
        Err(PreconditionError::Forbidden(format!(
            "this command must be run as root (running as '{}'); use sudo",
            caller.name
        )))
    }
}

/// NetBIOS name derived from the short host name: upper-cased, limited to
/// letters, digits and `-`, at most 15 characters.
///
/// # Errors
///
/// Returns an error if `hostname` fails or yields nothing usable.
pub fn default_server_name(executor: &dyn Executor) -> Result<String, ResourceError> {
    let output = executor.run("hostname", &["-s"])?.stdout;
    let name = output
        .trim()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .take(15)
        .collect::<String>()
        .to_ascii_uppercase();
    if name.is_empty() {
        return Err(ResourceError::InvalidState {
            resource: "hostname".to_string(),
            reason: format!("cannot derive a NetBIOS name from '{}'", output.trim()),
        });
    }
    Ok(name)
}

/// Tools from `required` that are not on `PATH`, in input order.
#[must_use]
pub fn missing_tools<'a>(executor: &dyn Executor, required: &'a [String]) -> Vec<&'a str> {
    required
        .iter()
        .map(String::as_str)
        .filter(|tool| !executor.which(tool))
        .collect()
}
