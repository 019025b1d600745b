//! Renders an email request into a deliverable notification.

use wecker_glocke::events::EmailRequest;

use crate::traits::Notification;

/// Build the plain-text notification for an email request.
///
/// The time shown is the user's own wall clock, never the server's.
pub fn notification_for(request: &EmailRequest) -> Notification {
    let body = format!(
        "ALARM TRIGGERED\n\
         \n\
         Code ID: {}\n\
         Description: {}\n\
         Time: {} ({})\n\
         \n\
         This is an automated alarm notification.\n\
         The time shown is in your local timezone.\n",
        request.code_id, request.description, request.alarm_time, request.timezone
    );

    Notification {
        to: request.to_email.clone(),
        subject: format!("Alarm: {}", request.code_id),
        body,
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    #[test]
    fn renders_local_time_and_zone() {
        let request = EmailRequest {
            to_email: "user@example.com".into(),
            code_id: "BATCH-7".into(),
            description: "Nightly batch window opens".into(),
            alarm_time: "22:30:00".parse().unwrap(),
            timezone: "Europe/Berlin".into(),
            occurrence_local_date: NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(),
        };

        let n = notification_for(&request);
        assert_eq!(n.to, "user@example.com");
        assert_eq!(n.subject, "Alarm: BATCH-7");
        assert!(n.body.contains("22:30:00 (Europe/Berlin)"));
        assert!(n.body.contains("Nightly batch window opens"));
    }
}
