use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Remarks stamped on every slot of an auto-approved record.
pub const AUTO_APPROVAL_REMARKS: &str = "system auto-approval";

/// The verdict an evaluator submits. There is no way to withdraw a decision,
/// only to replace it with another verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Approve,
    Reject,
}

impl Verdict {
    pub fn from_approve(approve: bool) -> Self {
        if approve {
            Verdict::Approve
        } else {
            Verdict::Reject
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::Approve => write!(f, "approve"),
            Verdict::Reject => write!(f, "reject"),
        }
    }
}

impl std::str::FromStr for Verdict {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "approve" | "approved" => Ok(Verdict::Approve),
            "reject" | "rejected" => Ok(Verdict::Reject),
            _ => Err(format!("Invalid verdict: {}", s)),
        }
    }
}

/// One evaluator's decision.
///
/// On the wire this is the tri-state `is_decided` object consumed by the
/// listing and detail views: `null` pending, `true` approved, `false`
/// rejected.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "DecisionWire", into = "DecisionWire")]
pub enum Decision {
    #[default]
    Undecided,
    Approved {
        at: DateTime<Utc>,
        remarks: Option<String>,
    },
    Rejected {
        at: DateTime<Utc>,
        remarks: Option<String>,
    },
}

impl Decision {
    pub fn new(verdict: Verdict, at: DateTime<Utc>, remarks: Option<String>) -> Self {
        match verdict {
            Verdict::Approve => Decision::Approved { at, remarks },
            Verdict::Reject => Decision::Rejected { at, remarks },
        }
    }

    pub fn verdict(&self) -> Option<Verdict> {
        match self {
            Decision::Undecided => None,
            Decision::Approved { .. } => Some(Verdict::Approve),
            Decision::Rejected { .. } => Some(Verdict::Reject),
        }
    }

    pub fn is_decided(&self) -> Option<bool> {
        self.verdict().map(|v| v == Verdict::Approve)
    }

    pub fn is_approved(&self) -> bool {
        matches!(self, Decision::Approved { .. })
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, Decision::Rejected { .. })
    }

    pub fn is_undecided(&self) -> bool {
        matches!(self, Decision::Undecided)
    }

    pub fn decided_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Decision::Undecided => None,
            Decision::Approved { at, .. } | Decision::Rejected { at, .. } => Some(*at),
        }
    }

    pub fn remarks(&self) -> Option<&str> {
        match self {
            Decision::Undecided => None,
            Decision::Approved { remarks, .. } | Decision::Rejected { remarks, .. } => {
                remarks.as_deref()
            }
        }
    }

    /// Same verdict and remarks, regardless of when it was recorded.
    pub fn same_outcome(&self, verdict: Verdict, remarks: Option<&str>) -> bool {
        self.verdict() == Some(verdict) && self.remarks() == remarks
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Decision::Undecided => write!(f, "undecided"),
            Decision::Approved { .. } => write!(f, "approved"),
            Decision::Rejected { .. } => write!(f, "rejected"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DecisionWire {
    is_decided: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    decided_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    remarks: Option<String>,
}

impl From<Decision> for DecisionWire {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::Undecided => DecisionWire {
                is_decided: None,
                decided_at: None,
                remarks: None,
            },
            Decision::Approved { at, remarks } => DecisionWire {
                is_decided: Some(true),
                decided_at: Some(at),
                remarks,
            },
            Decision::Rejected { at, remarks } => DecisionWire {
                is_decided: Some(false),
                decided_at: Some(at),
                remarks,
            },
        }
    }
}

impl TryFrom<DecisionWire> for Decision {
    type Error = String;

    fn try_from(wire: DecisionWire) -> Result<Self, Self::Error> {
        match (wire.is_decided, wire.decided_at) {
            (None, _) => Ok(Decision::Undecided),
            (Some(true), Some(at)) => Ok(Decision::Approved {
                at,
                remarks: wire.remarks,
            }),
            (Some(false), Some(at)) => Ok(Decision::Rejected {
                at,
                remarks: wire.remarks,
            }),
            (Some(_), None) => Err("decided entry is missing decided_at".to_string()),
        }
    }
}
