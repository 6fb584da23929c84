use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MemberKind {
    Procedure,
    Function,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Visibility {
    /// Declared in the package spec.
    Public,
    /// Present only in the body.
    Private,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ParamDirection {
    In,
    Out,
    InOut,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub direction: ParamDirection,
    pub data_type: String,
}

/// A standalone unit produced by decomposing an Oracle package. Identity is
/// `(package_name, member_name, overload_index)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageUnit {
    pub package_name: String,
    pub member_name: String,
    pub overload_index: usize,
    /// True when more than one member shares this name.
    pub is_overloaded: bool,
    pub kind: MemberKind,
    pub visibility: Visibility,
    pub parameters: Vec<Parameter>,
    pub return_type: Option<String>,
    pub body: String,
    /// Names of other members of the same package this unit calls.
    pub member_dependencies: Vec<String>,
}

impl PackageUnit {
    /// Mangled standalone name:
    /// `{package}_{member}` for unique public members,
    /// `{package}_{member}_v{index}` for overloads,
    /// `{package}__internal_{member}` for private members.
    pub fn target_name(&self) -> String {
        let infix = match self.visibility {
            Visibility::Public => "_".to_string(),
            Visibility::Private => "__internal_".to_string(),
        };
        let mut name = format!("{}{}{}", self.package_name, infix, self.member_name);
        if self.is_overloaded {
            name.push_str(&format!("_v{}", self.overload_index));
        }
        name
    }
}

/// A condition the decomposer could not mechanically translate
/// (package-level state, cursors, types, initialization blocks).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationNote {
    pub package_name: String,
    pub summary: String,
    pub snippet: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(name: &str, visibility: Visibility, overloaded: bool, index: usize) -> PackageUnit {
        PackageUnit {
            package_name: "PKG_X".into(),
            member_name: name.into(),
            overload_index: index,
            is_overloaded: overloaded,
            kind: MemberKind::Procedure,
            visibility,
            parameters: vec![],
            return_type: None,
            body: String::new(),
            member_dependencies: vec![],
        }
    }

    #[test]
    fn public_unique_member_name() {
        assert_eq!(
            unit("process", Visibility::Public, false, 0).target_name(),
            "PKG_X_process"
        );
    }

    #[test]
    fn overloaded_member_names_carry_index() {
        assert_eq!(
            unit("process", Visibility::Public, true, 1).target_name(),
            "PKG_X_process_v1"
        );
    }

    #[test]
    fn private_member_uses_internal_infix() {
        assert_eq!(
            unit("audit", Visibility::Private, false, 0).target_name(),
            "PKG_X__internal_audit"
        );
    }
}
