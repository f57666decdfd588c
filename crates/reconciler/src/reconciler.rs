//! Lifecycle engine
//!
//! Entry points take and return wire-level attribute bags. Each call decodes
//! the bag into the kind's typed record, renders statements through the
//! record and runs them in order against the server handle. Failures are
//! reported through [`Diagnostics`]; nothing here panics or retries.

use crate::codec::{check_desired, encode, fill_computed, with_defaults};
use crate::command::{Precondition, Step};
use crate::diagnostics::Diagnostics;
use crate::diff::{AttributeChange, Diff};
use crate::error::{Error, Result};
use crate::resource::ManagedResource;
use crate::resources::{Database, Login, Role, RoleAssignment, ServerInfo, SERVER_INFO_ID, User};
use crate::server::{RemoteError, ServerHandle};
use crate::types::{AttributeBag, Identifier, ResourceKind};

/// Run `$body` with `$R` bound to the record type of `$kind`
macro_rules! dispatch {
    ($kind:expr, |$R:ident| $body:expr, $read_only:expr) => {
        match $kind {
            ResourceKind::Database => {
                type $R = Database;
                $body
            }
            ResourceKind::Login => {
                type $R = Login;
                $body
            }
            ResourceKind::User => {
                type $R = User;
                $body
            }
            ResourceKind::Role => {
                type $R = Role;
                $body
            }
            ResourceKind::RoleAssignment => {
                type $R = RoleAssignment;
                $body
            }
            ResourceKind::ServerInfo => $read_only,
        }
    };
}

/// Outcome of one lifecycle call
///
/// `state` is the observed bag to persist. It is `None` when the object is
/// gone, or when the call failed and the caller should keep what it had.
/// A failed update that already renamed the object still carries a state,
/// recording the object under its new identity.
#[derive(Debug, Clone, Default)]
pub struct Response {
    pub state: Option<AttributeBag>,
    pub diagnostics: Diagnostics,
}

impl Response {
    fn present(state: AttributeBag, diagnostics: Diagnostics) -> Self {
        Self {
            state: Some(state),
            diagnostics,
        }
    }

    fn failed(diagnostics: Diagnostics) -> Self {
        Self {
            state: None,
            diagnostics,
        }
    }

    fn error(err: &Error) -> Self {
        let mut diagnostics = Diagnostics::new();
        diagnostics.push_error(err);
        Self::failed(diagnostics)
    }

    /// The object no longer exists on the server (drift, not a failure)
    pub fn is_absent(&self) -> bool {
        self.state.is_none() && !self.diagnostics.has_error()
    }
}

/// Lifecycle engine bound to one server handle
pub struct Reconciler<'a> {
    server: &'a dyn ServerHandle,
}

impl<'a> Reconciler<'a> {
    pub fn new(server: &'a dyn ServerHandle) -> Self {
        Self { server }
    }

    /// Create the object described by `desired`
    pub fn create(&self, kind: ResourceKind, desired: &AttributeBag) -> Response {
        dispatch!(
            kind,
            |R| self.create_kind::<R>(desired),
            Response::error(&unsupported(kind, "create"))
        )
    }

    /// Refresh `observed` from the server
    pub fn read(&self, kind: ResourceKind, observed: &AttributeBag) -> Response {
        dispatch!(kind, |R| self.read_kind::<R>(observed), self.server_info())
    }

    /// Converge an existing object from `observed` to `desired`
    pub fn update(
        &self,
        kind: ResourceKind,
        desired: &AttributeBag,
        observed: &AttributeBag,
    ) -> Response {
        dispatch!(
            kind,
            |R| self.update_kind::<R>(desired, observed),
            Response::error(&unsupported(kind, "update"))
        )
    }

    /// Drop the object recorded in `observed`
    pub fn delete(&self, kind: ResourceKind, observed: &AttributeBag) -> Diagnostics {
        dispatch!(kind, |R| self.delete_kind::<R>(observed), {
            let mut diagnostics = Diagnostics::new();
            diagnostics.push_error(&unsupported(kind, "delete"));
            diagnostics
        })
    }

    /// Adopt an existing object by identifier
    pub fn import(&self, kind: ResourceKind, identifier: &str) -> Response {
        dispatch!(
            kind,
            |R| self.import_kind::<R>(identifier),
            Response::error(&unsupported(kind, "import"))
        )
    }

    /// Read-only probe of the server version
    pub fn server_info(&self) -> Response {
        let kind = ResourceKind::ServerInfo;
        let query = ServerInfo::query();
        log::debug!("{kind}: {query}");
        match self.server.query_row(&query) {
            Ok(Some(row)) => {
                Response::present(ServerInfo::from_row(&row).to_bag(), Diagnostics::new())
            }
            Ok(None) => Response::error(&Error::NotFound {
                kind,
                identifier: SERVER_INFO_ID.to_string(),
            }),
            Err(err) => Response::error(&remote(kind, SERVER_INFO_ID, err)),
        }
    }

    fn create_kind<R: ManagedResource>(&self, desired: &AttributeBag) -> Response {
        let mut diagnostics = Diagnostics::new();
        let Some(record) = decode_desired::<R>(desired, &mut diagnostics) else {
            return Response::failed(diagnostics);
        };
        let id = record.identifier();
        log::info!("creating {} '{id}'", R::KIND);

        let result = self
            .check_preconditions::<R>(&id, &record.preconditions())
            .and_then(|()| self.run_steps::<R>(&id, &record.create(), "created"));
        if let Err(err) = result {
            diagnostics.push_error(&err);
            return Response::failed(diagnostics);
        }

        // Pick up server-assigned values; fall back to what was asked for
        let observed = match self.server.query_row(&record.lookup()) {
            Ok(Some(row)) => record.refresh(&row),
            Ok(None) => record,
            Err(err) => {
                log::warn!("{} '{id}' created but read-back failed: {err}", R::KIND);
                record
            }
        };
        Response::present(encode(&observed), diagnostics)
    }

    fn read_kind<R: ManagedResource>(&self, observed: &AttributeBag) -> Response {
        let record = match R::from_bag(&with_defaults(R::KIND, observed)) {
            Ok(record) => record,
            Err(err) => return Response::error(&err),
        };
        let id = record.identifier();
        let lookup = record.lookup();
        log::debug!("{} '{id}': {lookup}", R::KIND);

        match self.server.query_row(&lookup) {
            Ok(Some(row)) => Response::present(encode(&record.refresh(&row)), Diagnostics::new()),
            Ok(None) => {
                log::warn!("{} '{id}' no longer exists on the server", R::KIND);
                Response::default()
            }
            Err(err) => Response::error(&remote(R::KIND, id.as_str(), err)),
        }
    }

    fn update_kind<R: ManagedResource>(
        &self,
        desired: &AttributeBag,
        observed: &AttributeBag,
    ) -> Response {
        let mut diagnostics = Diagnostics::new();
        let Some(record) = decode_desired::<R>(desired, &mut diagnostics) else {
            return Response::failed(diagnostics);
        };
        let current = match R::from_bag(&with_defaults(R::KIND, observed)) {
            Ok(current) => current,
            Err(err) => {
                diagnostics.push_error(&err);
                return Response::failed(diagnostics);
            }
        };
        let id = current.identifier();
        let current_bag = current.to_bag();
        let diff = record.diff(&current_bag);

        let mut result = encode(&record);
        fill_computed(R::KIND, &mut result, &current_bag);
        if diff.is_empty() {
            log::debug!("{} '{id}' is up to date", R::KIND);
            return Response::present(result, diagnostics);
        }

        if let Some(change) = diff.requires_replace().next() {
            diagnostics.push_error(&irreplaceable(R::KIND, &id, change.attribute));
            return Response::failed(diagnostics);
        }

        let mut steps = Vec::new();
        let mut renamed = None;
        if let Some(change) = diff.renames().next() {
            match record.rename(&current) {
                Some(step) => {
                    steps.push(step);
                    renamed = renamed_state::<R>(&current_bag, change);
                }
                None => {
                    diagnostics.push_error(&irreplaceable(R::KIND, &id, change.attribute));
                    return Response::failed(diagnostics);
                }
            }
        }
        steps.extend(record.alter(&current, &diff));

        log::info!("updating {} '{id}'", R::KIND);
        let result_of_apply = self
            .check_preconditions::<R>(&id, &record.update_preconditions(&diff))
            .and_then(|()| self.run_steps::<R>(&id, &steps, "partially updated"));
        match result_of_apply {
            Ok(()) => Response::present(result, diagnostics),
            // The rename ran first, so the object now lives under its new identity
            Err(err @ Error::PartiallyApplied { .. }) if renamed.is_some() => {
                diagnostics.push_error(&err);
                Response {
                    state: renamed,
                    diagnostics,
                }
            }
            Err(err) => {
                diagnostics.push_error(&err);
                Response::failed(diagnostics)
            }
        }
    }

    fn delete_kind<R: ManagedResource>(&self, observed: &AttributeBag) -> Diagnostics {
        let mut diagnostics = Diagnostics::new();
        let record = match R::from_bag(&with_defaults(R::KIND, observed)) {
            Ok(record) => record,
            Err(err) => {
                diagnostics.push_error(&err);
                return diagnostics;
            }
        };
        let id = record.identifier();
        log::info!("deleting {} '{id}'", R::KIND);

        for statement in record.delete() {
            log::debug!("{} '{id}': {statement}", R::KIND);
            if let Err(err) = self.server.execute(&statement) {
                diagnostics.push_error(&remote(R::KIND, id.as_str(), err));
                break;
            }
        }
        diagnostics
    }

    fn import_kind<R: ManagedResource>(&self, identifier: &str) -> Response {
        let record = match R::from_identifier(identifier) {
            Ok(record) => record,
            Err(err) => return Response::error(&err),
        };
        log::info!("importing {} '{identifier}'", R::KIND);

        match self.server.query_row(&record.lookup()) {
            Ok(Some(row)) => Response::present(encode(&record.refresh(&row)), Diagnostics::new()),
            Ok(None) => Response::error(&Error::NotFound {
                kind: R::KIND,
                identifier: identifier.to_string(),
            }),
            Err(err) => Response::error(&remote(R::KIND, identifier, err)),
        }
    }

    fn check_preconditions<R: ManagedResource>(
        &self,
        id: &Identifier,
        checks: &[Precondition],
    ) -> Result<()> {
        for check in checks {
            log::debug!("{} '{id}' precondition: {}", R::KIND, check.query);
            let found = self
                .server
                .exists(&check.query)
                .map_err(|err| remote(R::KIND, id.as_str(), err))?;
            if !found {
                return Err(Error::Precondition {
                    kind: R::KIND,
                    identifier: id.to_string(),
                    attribute: check.attribute.to_string(),
                    message: check.message.clone(),
                });
            }
        }
        Ok(())
    }

    /// Run steps in order; a failure after the first step is a partial apply
    fn run_steps<R: ManagedResource>(
        &self,
        id: &Identifier,
        steps: &[Step],
        applied: &'static str,
    ) -> Result<()> {
        for (index, step) in steps.iter().enumerate() {
            log::debug!("{} '{id}' {}: {}", R::KIND, step.label, step.statement);
            if let Err(err) = self.server.execute(&step.statement) {
                return Err(if index == 0 {
                    remote(R::KIND, id.as_str(), err)
                } else {
                    Error::PartiallyApplied {
                        kind: R::KIND,
                        identifier: id.to_string(),
                        applied,
                        step: step.label,
                        message: err.message,
                    }
                });
            }
        }
        Ok(())
    }
}

/// Diff a desired bag against an observed bag without touching the server
pub fn diff(kind: ResourceKind, desired: &AttributeBag, observed: &AttributeBag) -> Result<Diff> {
    dispatch!(
        kind,
        |R| {
            let desired = R::from_bag(&with_defaults(kind, desired))?;
            let observed = R::from_bag(&with_defaults(kind, observed))?;
            Ok(desired.diff(&observed.to_bag()))
        },
        Err(unsupported(kind, "diff"))
    )
}

/// Validation a create would perform, without touching the server
pub fn validate(kind: ResourceKind, desired: &AttributeBag) -> Diagnostics {
    let mut diagnostics = Diagnostics::new();
    dispatch!(
        kind,
        |R| {
            decode_desired::<R>(desired, &mut diagnostics);
        },
        diagnostics.push_error(&unsupported(kind, "create"))
    );
    diagnostics
}

/// Identifier a desired bag resolves to
pub fn identify(kind: ResourceKind, desired: &AttributeBag) -> Result<Identifier> {
    dispatch!(
        kind,
        |R| Ok(R::from_bag(&with_defaults(kind, desired))?.identifier()),
        Ok(Identifier::new(SERVER_INFO_ID))
    )
}

/// Defaults, attribute-set checks, typed decode and kind validation
/// Observed state with only the renamed attribute moved to its desired value
fn renamed_state<R: ManagedResource>(
    observed: &AttributeBag,
    change: &AttributeChange,
) -> Option<AttributeBag> {
    let mut bag = observed.clone();
    bag.insert(change.attribute, change.to.clone()?);
    R::from_bag(&bag).ok().map(|record| encode(&record))
}

fn decode_desired<R: ManagedResource>(
    desired: &AttributeBag,
    diagnostics: &mut Diagnostics,
) -> Option<R> {
    let bag = with_defaults(R::KIND, desired);
    let errors = check_desired(R::KIND, &bag);
    if !errors.is_empty() {
        for err in &errors {
            diagnostics.push_error(err);
        }
        return None;
    }

    let record = match R::from_bag(&bag) {
        Ok(record) => record,
        Err(err) => {
            diagnostics.push_error(&err);
            return None;
        }
    };
    let id = record.identifier();
    diagnostics.extend(
        record
            .validate()
            .into_iter()
            .map(|d| d.for_identifier(id.as_str())),
    );
    (!diagnostics.has_error()).then_some(record)
}

fn remote(kind: ResourceKind, identifier: &str, err: RemoteError) -> Error {
    Error::Remote {
        kind,
        identifier: identifier.to_string(),
        message: err.message,
    }
}

fn irreplaceable(kind: ResourceKind, id: &Identifier, attribute: &str) -> Error {
    Error::IrreplaceableAttribute {
        kind,
        identifier: id.to_string(),
        attribute: attribute.to_string(),
    }
}

fn unsupported(kind: ResourceKind, operation: &'static str) -> Error {
    Error::Unsupported { kind, operation }
}
