use chrono::{DateTime, Utc};

use crate::model::employee::EmployeeId;

/// Server-side record of an issued access token, keyed by its `jti`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub jti: String,
    pub employee_id: EmployeeId,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
}

impl Session {
    pub fn new(jti: String, employee_id: EmployeeId, expires_at: DateTime<Utc>) -> Self {
        Self {
            jti,
            employee_id,
            expires_at,
            revoked: false,
        }
    }

    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        !self.revoked && self.expires_at > now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn revoked_or_expired_sessions_are_dead() {
        let now = Utc::now();
        let id = EmployeeId::parse("E-1").unwrap();

        let live = Session::new("a".into(), id.clone(), now + Duration::minutes(5));
        assert!(live.is_live(now));

        let expired = Session::new("b".into(), id.clone(), now - Duration::seconds(1));
        assert!(!expired.is_live(now));

        let mut revoked = live.clone();
        revoked.revoked = true;
        assert!(!revoked.is_live(now));
    }
}
