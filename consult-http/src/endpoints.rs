//! Backend route catalogue
//!
//! Paths are relative to the configured base URL.

/// Authentication routes
pub mod auth {
    pub const LOGIN: &str = "/auth/login";
    pub const REGISTER_PATIENT: &str = "/auth/register/patient";
    pub const REGISTER_DOCTOR: &str = "/auth/register/doctor";
    pub const FORGOT_PASSWORD: &str = "/auth/forgot-password";
    pub const RESET_PASSWORD: &str = "/auth/reset-password";
    pub const REFRESH_TOKEN: &str = "/auth/refresh";
    pub const LOGOUT: &str = "/auth/logout";
    pub const VALIDATE: &str = "/auth/validate";
}

/// Patient routes
pub mod patient {
    pub const PROFILE: &str = "/patient/profile";
    pub const APPLICATIONS: &str = "/patient/applications";
    pub const DOCTORS: &str = "/patient/doctors";
    pub const PAYMENTS: &str = "/patient/payments";
    pub const NOTIFICATIONS: &str = "/patient/notifications";
}

/// Doctor routes
pub mod doctor {
    pub const PROFILE: &str = "/doctor/profile";
    pub const APPLICATIONS: &str = "/doctor/applications";
    pub const AVAILABILITY: &str = "/doctor/availability";
    pub const EARNINGS: &str = "/doctor/earnings";
    pub const NOTIFICATIONS: &str = "/doctor/notifications";
}

/// Admin routes
pub mod admin {
    pub const USERS: &str = "/admin/users";
    pub const DOCTORS_PENDING: &str = "/admin/doctors/pending";
    pub const DOCTORS_APPROVE: &str = "/admin/doctors/approve";
    pub const DOCTORS_REJECT: &str = "/admin/doctors/reject";
    pub const DOCTORS_BULK: &str = "/admin/doctors/bulk";
    pub const NOTIFICATIONS: &str = "/admin/notifications";
    pub const ANALYTICS: &str = "/admin/analytics";
}

/// File transfer routes
pub mod files {
    use std::fmt::Display;

    pub const UPLOAD: &str = "/files/upload";

    pub fn download(file_id: impl Display) -> String {
        format!("/files/download/{}", file_id)
    }

    /// Metadata of a file; DELETE on the same path removes it
    pub fn info(file_id: impl Display) -> String {
        format!("/files/{}", file_id)
    }

    pub fn preview(file_id: impl Display) -> String {
        format!("/files/preview/{}", file_id)
    }

    pub fn by_application(application_id: impl Display) -> String {
        format!("/files/application/{}", application_id)
    }
}

/// Notification routes
pub mod notifications {
    use std::fmt::Display;

    pub const MARK_ALL_READ: &str = "/notifications/mark-all-read";

    pub fn mark_read(id: impl Display) -> String {
        format!("/notifications/{}/read", id)
    }
}

/// Routes that need no session
pub mod public {
    pub const STATS: &str = "/public/stats";
    pub const CONTACT: &str = "/public/contact";
}
