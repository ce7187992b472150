//! Status helper enums mapping to SMALLSERIAL/SMALLINT lookup tables.
//!
//! Each enum variant's discriminant matches the seed data order (1-based)
//! in the corresponding `*_statuses` database table.

/// Status ID type matching SMALLINT/SMALLSERIAL in the database.
pub type StatusId = i16;

macro_rules! define_status_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $val:expr ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[repr(i16)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $val ),+
        }

        impl $name {
            /// Return the database status ID.
            pub fn id(self) -> StatusId {
                self as StatusId
            }
        }

        impl From<$name> for StatusId {
            fn from(value: $name) -> Self {
                value as StatusId
            }
        }
    };
}

define_status_enum! {
    /// Payout request lifecycle status.
    ///
    /// Transition rules live in `glowcast_core::payout::state_machine`.
    PayoutRequestStatus {
        Pending = 1,
        Approved = 2,
        Denied = 3,
        Processing = 4,
        Fulfilled = 5,
        Failed = 6,
    }
}

define_status_enum! {
    /// Payout run (batch) status.
    PayoutRunStatus {
        Processing = 1,
        Completed = 2,
        Failed = 3,
    }
}

define_status_enum! {
    /// Per-item settlement status inside a run.
    PayoutItemStatus {
        Queued = 1,
        Success = 2,
        Failed = 3,
        Returned = 4,
    }
}

define_status_enum! {
    /// Gift-card fulfillment status.
    FulfillmentStatus {
        Pending = 1,
        Completed = 2,
        Failed = 3,
    }
}

define_status_enum! {
    /// Outbox task delivery status.
    OutboxStatus {
        Pending = 1,
        Delivered = 2,
        Failed = 3,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payout_request_status_ids_match_seed_data() {
        assert_eq!(PayoutRequestStatus::Pending.id(), 1);
        assert_eq!(PayoutRequestStatus::Approved.id(), 2);
        assert_eq!(PayoutRequestStatus::Denied.id(), 3);
        assert_eq!(PayoutRequestStatus::Processing.id(), 4);
        assert_eq!(PayoutRequestStatus::Fulfilled.id(), 5);
        assert_eq!(PayoutRequestStatus::Failed.id(), 6);
    }

    #[test]
    fn payout_item_status_ids_match_seed_data() {
        assert_eq!(PayoutItemStatus::Queued.id(), 1);
        assert_eq!(PayoutItemStatus::Success.id(), 2);
        assert_eq!(PayoutItemStatus::Failed.id(), 3);
        assert_eq!(PayoutItemStatus::Returned.id(), 4);
    }

    #[test]
    fn status_into_status_id() {
        let id: StatusId = PayoutRunStatus::Completed.into();
        assert_eq!(id, 2);
    }

    #[test]
    fn request_enum_agrees_with_core_state_machine_names() {
        use glowcast_core::payout::state_machine::status_name;
        assert_eq!(status_name(PayoutRequestStatus::Pending.id()), "Pending");
        assert_eq!(status_name(PayoutRequestStatus::Fulfilled.id()), "Fulfilled");
        assert_eq!(status_name(PayoutRequestStatus::Failed.id()), "Failed");
    }
}
