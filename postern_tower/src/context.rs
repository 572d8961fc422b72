use http::Extensions;
use postern::{Grant, TokenRejected};

/// The outcome of looking for a bearer token on a request
///
/// [`ExtractBearer`](crate::ExtractBearer) attaches exactly one outcome to
/// every request it sees, so that later stages can decide what to do without
/// validating the token again.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Authentication {
    /// A valid token was presented
    Granted(Grant),

    /// A token was presented but refused
    Rejected(TokenRejected),

    /// No bearer token was presented
    #[default]
    Absent,
}

static ABSENT: Authentication = Authentication::Absent;

impl Authentication {
    /// Attaches this outcome to a request's extensions, replacing any outcome
    /// already there
    ///
    /// A granted outcome also attaches a copy of its [`Grant`], so that
    /// handlers can extract the grant directly.
    pub fn attach(self, extensions: &mut Extensions) {
        if let Self::Granted(grant) = &self {
            let _ = extensions.insert(grant.clone());
        } else {
            let _ = extensions.remove::<Grant>();
        }
        let _ = extensions.insert(self);
    }

    /// Reads the outcome attached to a request's extensions
    ///
    /// Reads as [`Absent`](Self::Absent) if no outcome was ever attached.
    pub fn read(extensions: &Extensions) -> &Self {
        extensions.get::<Self>().unwrap_or(&ABSENT)
    }

    /// The grant, if a valid token was presented
    pub fn grant(&self) -> Option<&Grant> {
        match self {
            Self::Granted(grant) => Some(grant),
            _ => None,
        }
    }

    /// Whether a valid token was presented
    pub fn is_granted(&self) -> bool {
        matches!(self, Self::Granted(_))
    }
}

#[cfg(test)]
mod tests {
    use postern::{scopes, Identity};

    use super::*;

    fn grant() -> Grant {
        Grant::new(Identity::from_static("1"), scopes!["read"])
    }

    #[test]
    fn nothing_attached_reads_as_absent() {
        let extensions = Extensions::new();

        assert_eq!(Authentication::read(&extensions), &Authentication::Absent);
    }

    #[test]
    fn attached_outcome_reads_back() {
        let mut extensions = Extensions::new();

        Authentication::Rejected(TokenRejected::Expired).attach(&mut extensions);

        assert_eq!(
            Authentication::read(&extensions),
            &Authentication::Rejected(TokenRejected::Expired)
        );
        assert!(extensions.get::<Grant>().is_none());
    }

    #[test]
    fn granted_outcome_also_exposes_the_grant() {
        let mut extensions = Extensions::new();

        Authentication::Granted(grant()).attach(&mut extensions);

        assert!(Authentication::read(&extensions).is_granted());
        assert_eq!(Authentication::read(&extensions).grant(), Some(&grant()));
        assert_eq!(extensions.get::<Grant>(), Some(&grant()));
    }

    #[test]
    fn later_outcome_replaces_earlier_grant() {
        let mut extensions = Extensions::new();

        Authentication::Granted(grant()).attach(&mut extensions);
        Authentication::Absent.attach(&mut extensions);

        assert_eq!(Authentication::read(&extensions), &Authentication::Absent);
        assert!(extensions.get::<Grant>().is_none());
    }
}
