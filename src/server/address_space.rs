//! The address space: node registry and per-attribute access.

use std::collections::HashMap;
use std::fmt;

use super::session::ServerSession;
use crate::core::StatusCode;
use crate::services::AttributeId;
use crate::types::{DateTime, LocalizedText, NodeId, QualifiedName, Variant};

/// The value attribute may be read.
pub const ACCESS_LEVEL_CURRENT_READ: u8 = 0x01;
/// The value attribute may be written.
pub const ACCESS_LEVEL_CURRENT_WRITE: u8 = 0x02;

/// The class of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum NodeClass {
    /// No class assigned.
    Unspecified = 0,
    /// A plain object.
    Object = 1,
    /// A variable carrying a value.
    Variable = 2,
    /// A callable method.
    Method = 4,
    /// An object type.
    ObjectType = 8,
    /// A variable type.
    VariableType = 16,
    /// A reference type.
    ReferenceType = 32,
    /// A data type.
    DataType = 64,
    /// A view over the address space.
    View = 128,
}

/// One node in the address space.
///
/// Attribute reads receive the calling session and the request's
/// `max_age` hint in milliseconds; implementations may cache and only
/// refresh values older than the hint. Attributes whose types the
/// [`Variant`] cannot carry answer `BadAttributeIdInvalid`.
pub trait Node: Send {
    /// The node's identifier.
    fn node_id(&self) -> NodeId;

    /// The node's class.
    fn node_class(&self) -> NodeClass;

    /// The name used when browsing.
    fn browse_name(&self) -> QualifiedName;

    /// The name shown to operators.
    fn display_name(&self) -> LocalizedText;

    /// Read one attribute.
    fn read_attribute(
        &mut self,
        attribute: AttributeId,
        session: &ServerSession,
        max_age: f64,
    ) -> Result<Variant, StatusCode>;

    /// Write one attribute, answering the outcome.
    fn write_attribute(
        &mut self,
        attribute: AttributeId,
        session: &ServerSession,
        value: &Variant,
    ) -> StatusCode;
}

/// A variable node owning a current value.
///
/// An optional refresh callback models values backed by an external
/// source (a field device register, a process variable); it runs when
/// a read's `max_age` exceeds the cached value's age.
pub struct VariableNode {
    node_id: NodeId,
    browse_name: QualifiedName,
    display_name: LocalizedText,
    value: Variant,
    access_level: u8,
    refresh: Option<Box<dyn FnMut() -> Variant + Send>>,
    refreshed_at: DateTime,
}

impl VariableNode {
    /// A readable variable with an initial value.
    pub fn new(node_id: NodeId, browse_name: QualifiedName, value: impl Into<Variant>) -> Self {
        let display_name = LocalizedText::new(browse_name.name.clone());
        Self {
            node_id,
            browse_name,
            display_name,
            value: value.into(),
            access_level: ACCESS_LEVEL_CURRENT_READ,
            refresh: None,
            refreshed_at: DateTime::now(),
        }
    }

    /// Replace the display name.
    pub fn with_display_name(mut self, name: LocalizedText) -> Self {
        self.display_name = name;
        self
    }

    /// Replace the access-level flags.
    pub fn with_access_level(mut self, access_level: u8) -> Self {
        self.access_level = access_level;
        self
    }

    /// Attach a refresh callback consulted on stale reads.
    pub fn with_refresh(mut self, refresh: impl FnMut() -> Variant + Send + 'static) -> Self {
        self.refresh = Some(Box::new(refresh));
        self
    }

    /// The current value, without freshness checks.
    pub fn value(&self) -> &Variant {
        &self.value
    }

    /// Replace the current value directly.
    pub fn set_value(&mut self, value: impl Into<Variant>) {
        self.value = value.into();
        self.refreshed_at = DateTime::now();
    }

    fn read_value(&mut self, max_age: f64) -> Variant {
        if let Some(refresh) = self.refresh.as_mut() {
            let age_ms = DateTime::now().millis_since(self.refreshed_at) as f64;
            if max_age <= 0.0 || age_ms > max_age {
                self.value = refresh();
                self.refreshed_at = DateTime::now();
            }
        }
        self.value.clone()
    }
}

impl fmt::Debug for VariableNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VariableNode")
            .field("node_id", &self.node_id)
            .field("browse_name", &self.browse_name)
            .field("value", &self.value)
            .field("access_level", &self.access_level)
            .finish()
    }
}

impl Node for VariableNode {
    fn node_id(&self) -> NodeId {
        self.node_id.clone()
    }

    fn node_class(&self) -> NodeClass {
        NodeClass::Variable
    }

    fn browse_name(&self) -> QualifiedName {
        self.browse_name.clone()
    }

    fn display_name(&self) -> LocalizedText {
        self.display_name.clone()
    }

    fn read_attribute(
        &mut self,
        attribute: AttributeId,
        _session: &ServerSession,
        max_age: f64,
    ) -> Result<Variant, StatusCode> {
        match attribute {
            AttributeId::Value => {
                if self.access_level & ACCESS_LEVEL_CURRENT_READ == 0 {
                    return Err(StatusCode::BAD_NOT_READABLE);
                }
                Ok(self.read_value(max_age))
            }
            AttributeId::NodeClass => Ok(Variant::Int32(NodeClass::Variable as i32)),
            AttributeId::AccessLevel => Ok(Variant::Byte(self.access_level)),
            AttributeId::UserAccessLevel => Ok(Variant::Byte(self.access_level)),
            AttributeId::WriteMask | AttributeId::UserWriteMask => Ok(Variant::UInt32(0)),
            AttributeId::ValueRank => Ok(Variant::Int32(-1)),
            AttributeId::MinimumSamplingInterval => Ok(Variant::Double(-1.0)),
            AttributeId::Historizing => Ok(Variant::Boolean(false)),
            _ => Err(StatusCode::BAD_ATTRIBUTE_ID_INVALID),
        }
    }

    fn write_attribute(
        &mut self,
        attribute: AttributeId,
        _session: &ServerSession,
        value: &Variant,
    ) -> StatusCode {
        match attribute {
            AttributeId::Value => {
                if self.access_level & ACCESS_LEVEL_CURRENT_WRITE == 0 {
                    return StatusCode::BAD_NOT_WRITABLE;
                }
                if !value.same_type(&self.value) {
                    return StatusCode::BAD_TYPE_MISMATCH;
                }
                self.value = value.clone();
                self.refreshed_at = DateTime::now();
                StatusCode::GOOD
            }
            _ => StatusCode::BAD_NOT_WRITABLE,
        }
    }
}

/// A plain object node.
#[derive(Debug)]
pub struct ObjectNode {
    node_id: NodeId,
    browse_name: QualifiedName,
    display_name: LocalizedText,
    event_notifier: u8,
}

impl ObjectNode {
    /// An object with no event capability.
    pub fn new(node_id: NodeId, browse_name: QualifiedName) -> Self {
        let display_name = LocalizedText::new(browse_name.name.clone());
        Self {
            node_id,
            browse_name,
            display_name,
            event_notifier: 0,
        }
    }
}

impl Node for ObjectNode {
    fn node_id(&self) -> NodeId {
        self.node_id.clone()
    }

    fn node_class(&self) -> NodeClass {
        NodeClass::Object
    }

    fn browse_name(&self) -> QualifiedName {
        self.browse_name.clone()
    }

    fn display_name(&self) -> LocalizedText {
        self.display_name.clone()
    }

    fn read_attribute(
        &mut self,
        attribute: AttributeId,
        _session: &ServerSession,
        _max_age: f64,
    ) -> Result<Variant, StatusCode> {
        match attribute {
            AttributeId::NodeClass => Ok(Variant::Int32(NodeClass::Object as i32)),
            AttributeId::EventNotifier => Ok(Variant::Byte(self.event_notifier)),
            AttributeId::WriteMask | AttributeId::UserWriteMask => Ok(Variant::UInt32(0)),
            _ => Err(StatusCode::BAD_ATTRIBUTE_ID_INVALID),
        }
    }

    fn write_attribute(
        &mut self,
        _attribute: AttributeId,
        _session: &ServerSession,
        _value: &Variant,
    ) -> StatusCode {
        StatusCode::BAD_NOT_WRITABLE
    }
}

/// The node registry, keyed by [`NodeId`].
#[derive(Default)]
pub struct AddressSpace {
    nodes: HashMap<NodeId, Box<dyn Node>>,
}

impl AddressSpace {
    /// An empty address space.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node under its own id.
    pub fn add_node(&mut self, node: impl Node + 'static) {
        self.nodes.insert(node.node_id(), Box::new(node));
    }

    /// Look up a node.
    pub fn get(&self, id: &NodeId) -> Option<&dyn Node> {
        self.nodes.get(id).map(AsRef::as_ref)
    }

    /// Look up a node for attribute access.
    pub fn get_mut(&mut self, id: &NodeId) -> Option<&mut Box<dyn Node>> {
        self.nodes.get_mut(id)
    }

    /// Whether a node with this id is registered.
    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Number of registered nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the space holds no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl fmt::Debug for AddressSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AddressSpace")
            .field("nodes", &self.nodes.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::CreateSessionRequest;

    fn session() -> ServerSession {
        ServerSession::create(&CreateSessionRequest::default())
    }

    fn input_node(name: &str, value: bool) -> VariableNode {
        VariableNode::new(
            NodeId::string(1, name),
            QualifiedName::new(1, name),
            Variant::Boolean(value),
        )
    }

    #[test]
    fn test_variable_value_read() {
        let mut node = input_node("I1", true);
        let s = session();
        assert_eq!(
            node.read_attribute(AttributeId::Value, &s, 0.0),
            Ok(Variant::Boolean(true))
        );
        assert_eq!(
            node.read_attribute(AttributeId::NodeClass, &s, 0.0),
            Ok(Variant::Int32(2))
        );
    }

    #[test]
    fn test_unreadable_value_rejected() {
        let mut node = input_node("I1", true).with_access_level(0);
        let s = session();
        assert_eq!(
            node.read_attribute(AttributeId::Value, &s, 0.0),
            Err(StatusCode::BAD_NOT_READABLE)
        );
    }

    #[test]
    fn test_inexpressible_attribute_rejected() {
        let mut node = input_node("I1", false);
        let s = session();
        assert_eq!(
            node.read_attribute(AttributeId::BrowseName, &s, 0.0),
            Err(StatusCode::BAD_ATTRIBUTE_ID_INVALID)
        );
    }

    #[test]
    fn test_write_type_checked() {
        let mut node = input_node("Q1", false)
            .with_access_level(ACCESS_LEVEL_CURRENT_READ | ACCESS_LEVEL_CURRENT_WRITE);
        let s = session();

        assert_eq!(
            node.write_attribute(AttributeId::Value, &s, &Variant::Boolean(true)),
            StatusCode::GOOD
        );
        assert_eq!(node.value(), &Variant::Boolean(true));

        assert_eq!(
            node.write_attribute(AttributeId::Value, &s, &Variant::UInt16(3)),
            StatusCode::BAD_TYPE_MISMATCH
        );
        assert_eq!(node.value(), &Variant::Boolean(true));
    }

    #[test]
    fn test_write_requires_access() {
        let mut node = input_node("I1", false);
        let s = session();
        assert_eq!(
            node.write_attribute(AttributeId::Value, &s, &Variant::Boolean(true)),
            StatusCode::BAD_NOT_WRITABLE
        );
    }

    #[test]
    fn test_refresh_consulted_on_stale_read() {
        let mut node = input_node("AN1", false).with_refresh(|| Variant::Boolean(true));
        let s = session();
        // max_age 0 always refreshes.
        assert_eq!(
            node.read_attribute(AttributeId::Value, &s, 0.0),
            Ok(Variant::Boolean(true))
        );
        // A huge max_age accepts the cached value.
        let mut cached = input_node("AN2", false).with_refresh(|| Variant::Boolean(true));
        assert_eq!(
            cached.read_attribute(AttributeId::Value, &s, 1e12),
            Ok(Variant::Boolean(false))
        );
    }

    #[test]
    fn test_object_node_attributes() {
        let mut node = ObjectNode::new(NodeId::string(1, "MT101"), QualifiedName::new(1, "MT101"));
        let s = session();
        assert_eq!(node.node_class(), NodeClass::Object);
        assert_eq!(
            node.read_attribute(AttributeId::EventNotifier, &s, 0.0),
            Ok(Variant::Byte(0))
        );
        assert_eq!(
            node.write_attribute(AttributeId::Value, &s, &Variant::Byte(1)),
            StatusCode::BAD_NOT_WRITABLE
        );
    }

    #[test]
    fn test_address_space_registry() {
        let mut space = AddressSpace::new();
        assert!(space.is_empty());
        space.add_node(input_node("I1", true));
        space.add_node(input_node("I2", false));

        assert_eq!(space.len(), 2);
        assert!(space.contains(&NodeId::string(1, "I1")));
        assert!(!space.contains(&NodeId::string(1, "I9")));
        assert!(space.get(&NodeId::string(1, "I2")).is_some());
    }
}
