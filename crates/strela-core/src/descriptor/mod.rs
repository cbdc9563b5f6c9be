//! Descriptor model.
//!
//! Descriptors describe schema elements at runtime. They are built from the
//! `prost-types` representation of `.proto` files (as produced by `protoc
//! --descriptor_set_out`) in two phases:
//!
//! 1. **Allocate**: every message, field, enum, enum value, service and
//!    method of a file is created and its fully-qualified name registered in
//!    the file's [`DescriptorPool`]. Duplicates fail here.
//! 2. **Link**: type names are resolved following the schema scoping rules,
//!    extensions are attached to their extended type and defaults are
//!    computed. Forward and mutually-recursive references resolve because
//!    every name already exists.
//!
//! A [`FileDescriptor`] owns flat tables of everything it defines. The other
//! handles ([`Descriptor`], [`FieldDescriptor`], ...) are a file plus an index,
//! so references between elements, including cycles, never own each other.

mod enums;
mod field;
mod file;
mod message;
mod pool;
mod service;
mod visit;

pub use enums::{EnumDescriptor, EnumValueDescriptor};
pub use field::{FieldDescriptor, Label};
pub use file::{FileDescriptor, Syntax};
pub use message::Descriptor;
pub use pool::{DescriptorPool, Symbol, SymbolKind, SymbolRef};
pub use service::{MethodDescriptor, ServiceDescriptor};
pub use visit::{walk_file, DescriptorVisitor, StatsVisitor};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::reflect::Value;
    use crate::wire::FieldType;
    use prost_types::field_descriptor_proto::{Label as L, Type as T};
    use prost_types::{
        descriptor_proto::ExtensionRange, DescriptorProto, EnumDescriptorProto,
        EnumValueDescriptorProto, FieldDescriptorProto, FieldOptions, FileDescriptorProto,
        FileDescriptorSet, MethodDescriptorProto, ServiceDescriptorProto,
    };

    fn field(name: &str, number: i32, label: L, ty: T) -> FieldDescriptorProto {
        FieldDescriptorProto {
            name: Some(name.to_string()),
            number: Some(number),
            label: Some(label as i32),
            r#type: Some(ty as i32),
            ..Default::default()
        }
    }

    fn typed(name: &str, number: i32, label: L, ty: T, type_name: &str) -> FieldDescriptorProto {
        FieldDescriptorProto {
            type_name: Some(type_name.to_string()),
            ..field(name, number, label, ty)
        }
    }

    fn message(name: &str, fields: Vec<FieldDescriptorProto>) -> DescriptorProto {
        DescriptorProto {
            name: Some(name.to_string()),
            field: fields,
            ..Default::default()
        }
    }

    fn color() -> EnumDescriptorProto {
        let value = |name: &str, number| EnumValueDescriptorProto {
            name: Some(name.to_string()),
            number: Some(number),
            options: None,
        };
        EnumDescriptorProto {
            name: Some("Color".to_string()),
            value: vec![value("RED", 0), value("GREEN", 1), value("VERDANT", 1)],
            ..Default::default()
        }
    }

    fn schema() -> FileDescriptorProto {
        let mut with_default = field("x", 2, L::Required, T::Int32);
        with_default.default_value = Some("7".to_string());
        let mut packed = field("nums", 3, L::Repeated, T::Int32);
        packed.options = Some(FieldOptions {
            packed: Some(true),
            ..Default::default()
        });
        let mut colored = typed("c", 4, L::Optional, T::Enum, "Color");
        colored.default_value = Some("GREEN".to_string());
        let mut packed_string = field("names", 5, L::Repeated, T::String);
        packed_string.options = Some(FieldOptions {
            packed: Some(true),
            ..Default::default()
        });

        let mut extendable = message("Ext", vec![]);
        extendable.extension_range = vec![ExtensionRange {
            start: Some(100),
            end: Some(200),
            options: None,
        }];

        let mut ext = field("ext_value", 100, L::Optional, T::Int32);
        ext.extendee = Some(".pkg.Ext".to_string());

        FileDescriptorProto {
            name: Some("pkg/a.proto".to_string()),
            package: Some("pkg".to_string()),
            message_type: vec![
                message(
                    "A",
                    vec![
                        typed("b", 1, L::Optional, T::Message, "B"),
                        with_default,
                        packed,
                        colored,
                        packed_string,
                    ],
                ),
                message("B", vec![typed("a", 1, L::Optional, T::Message, ".pkg.A")]),
                message("Plain", vec![field("y", 1, L::Optional, T::Int32)]),
                extendable,
            ],
            enum_type: vec![color()],
            extension: vec![ext],
            service: vec![ServiceDescriptorProto {
                name: Some("Svc".to_string()),
                method: vec![MethodDescriptorProto {
                    name: Some("Call".to_string()),
                    input_type: Some(".pkg.A".to_string()),
                    output_type: Some("B".to_string()),
                    server_streaming: Some(true),
                    ..Default::default()
                }],
                options: None,
            }],
            ..Default::default()
        }
    }

    fn build() -> FileDescriptor {
        FileDescriptor::new(schema(), &[]).unwrap()
    }

    #[test]
    fn test_messages_and_fields() {
        let file = build();
        assert_eq!(file.name(), "pkg/a.proto");
        assert_eq!(file.syntax(), Syntax::Proto2);

        let a = file.message_type_by_name("A").unwrap();
        assert_eq!(a.full_name(), "pkg.A");
        assert_eq!(a.fields().count(), 5);

        let x = a.field_by_name("x").unwrap();
        assert_eq!(x.number(), 2);
        assert_eq!(x.index(), 1);
        assert!(x.is_required());
        assert_eq!(x.default_value(), Value::I32(7));
        assert!(x.has_default_value());
        assert_eq!(x.containing_type().unwrap(), a);

        let nums = a.field_by_number(3).unwrap();
        assert!(nums.is_repeated());
        assert!(nums.is_packed());
        assert_eq!(nums.json_name(), "nums");

        // strings cannot be packed whatever the option says
        let names = a.field_by_name("names").unwrap();
        assert!(!names.is_packed());
        assert!(!names.is_packable());
    }

    #[test]
    fn test_mutually_recursive_types_link() {
        let file = build();
        let a = file.find_message_type("pkg.A").unwrap();
        let b = file.find_message_type(".pkg.B").unwrap();
        assert_eq!(a.field_by_number(1).unwrap().message_type().unwrap(), b);
        assert_eq!(b.field_by_number(1).unwrap().message_type().unwrap(), a);
    }

    #[test]
    fn test_has_required_fields() {
        let file = build();
        assert!(file.find_message_type("pkg.A").unwrap().has_required_fields());
        // through the cycle back to A
        assert!(file.find_message_type("pkg.B").unwrap().has_required_fields());
        assert!(!file.find_message_type("pkg.Plain").unwrap().has_required_fields());
        // extendable types are always checked
        assert!(file.find_message_type("pkg.Ext").unwrap().has_required_fields());
    }

    #[test]
    fn test_enum_defaults_and_aliases() {
        let file = build();
        let color = file.enum_type_by_name("Color").unwrap();
        assert_eq!(color.values().count(), 3);
        assert_eq!(color.value_by_number(1).unwrap().name(), "GREEN");
        assert!(color.is_valid_value(0));
        assert!(!color.is_valid_value(7));
        assert_eq!(color.default_value().unwrap().number(), 0);

        let c = file.find_message_type("pkg.A").unwrap().field_by_name("c").unwrap();
        assert_eq!(c.field_type(), FieldType::Enum);
        assert_eq!(c.enum_type().unwrap(), color);
        assert_eq!(c.default_value(), Value::EnumNumber(1));

        // values live beside their enum
        match file.find_symbol("pkg.GREEN") {
            Some(Symbol::EnumValue(v)) => assert_eq!(v.enum_type(), color),
            other => panic!("unexpected {:?}", other),
        }
        assert!(file.find_symbol("pkg.Color.GREEN").is_none());
    }

    #[test]
    fn test_extensions_attach_to_extendee() {
        let file = build();
        let ext_type = file.find_message_type("pkg.Ext").unwrap();
        assert!(ext_type.is_extendable());
        assert!(ext_type.is_extension_number(150));
        assert!(!ext_type.is_extension_number(200));

        let ext = file.extension_by_name("ext_value").unwrap();
        assert!(ext.is_extension());
        assert_eq!(ext.containing_type().unwrap(), ext_type);
        assert!(ext.extension_scope().is_none());
        assert_eq!(ext_type.extension_by_number(100).unwrap(), ext);
        assert_eq!(file.all_extensions().count(), 1);
    }

    #[test]
    fn test_services() {
        let file = build();
        let svc = file.service_by_name("Svc").unwrap();
        let call = svc.method_by_name("Call").unwrap();
        assert_eq!(call.full_name(), "pkg.Svc.Call");
        assert_eq!(call.input_type().unwrap().full_name(), "pkg.A");
        assert_eq!(call.output_type().unwrap().full_name(), "pkg.B");
        assert!(call.is_server_streaming());
        assert!(!call.is_client_streaming());
        assert_eq!(call.service(), svc);
    }

    #[test]
    fn test_duplicate_symbol_conflicts() {
        let mut proto = schema();
        proto.message_type.push(message("A", vec![]));
        assert!(matches!(
            FileDescriptor::new(proto, &[]),
            Err(Error::DescriptorConflict { .. })
        ));
    }

    #[test]
    fn test_duplicate_field_number_conflicts() {
        let mut proto = schema();
        proto.message_type[2]
            .field
            .push(field("z", 1, L::Optional, T::Bool));
        assert!(matches!(
            FileDescriptor::new(proto, &[]),
            Err(Error::DescriptorConflict { .. })
        ));
    }

    #[test]
    fn test_extension_outside_range_conflicts() {
        let mut proto = schema();
        proto.extension[0].number = Some(300);
        assert!(matches!(
            FileDescriptor::new(proto, &[]),
            Err(Error::DescriptorConflict { .. })
        ));
    }

    #[test]
    fn test_unresolved_type() {
        let mut proto = schema();
        proto.message_type[2]
            .field
            .push(typed("m", 2, L::Optional, T::Message, "Missing"));
        assert!(matches!(
            FileDescriptor::new(proto, &[]),
            Err(Error::UnresolvedType { .. })
        ));
    }

    #[test]
    fn test_invalid_default() {
        let mut proto = schema();
        proto.message_type[0].field[3].default_value = Some("PURPLE".to_string());
        assert!(matches!(
            FileDescriptor::new(proto, &[]),
            Err(Error::InvalidDefaultValue { .. })
        ));
    }

    #[test]
    fn test_dependencies_and_set_ordering() {
        let dependent = FileDescriptorProto {
            name: Some("pkg/b.proto".to_string()),
            package: Some("pkg.sub".to_string()),
            dependency: vec!["pkg/a.proto".to_string()],
            message_type: vec![message(
                "Holder",
                vec![typed("a", 1, L::Optional, T::Message, "A")],
            )],
            ..Default::default()
        };
        // dependent listed first; the set builds dependencies first
        let files = FileDescriptor::from_set(FileDescriptorSet {
            file: vec![dependent, schema()],
        })
        .unwrap();
        assert_eq!(files[0].name(), "pkg/a.proto");

        let holder = files[1].find_message_type("pkg.sub.Holder").unwrap();
        let a = holder.field_by_number(1).unwrap().message_type().unwrap();
        assert_eq!(a.file(), &files[0]);
        assert_eq!(files[1].dependencies().len(), 1);

        // the shared package is not a conflict, but redefining A is
        let clash = FileDescriptorProto {
            name: Some("pkg/c.proto".to_string()),
            package: Some("pkg".to_string()),
            dependency: vec!["pkg/a.proto".to_string()],
            message_type: vec![message("A", vec![])],
            ..Default::default()
        };
        assert!(FileDescriptor::new(clash, &files[..1]).is_err());
    }

    #[test]
    fn test_missing_dependency() {
        let dependent = FileDescriptorProto {
            name: Some("b.proto".to_string()),
            dependency: vec!["nowhere.proto".to_string()],
            ..Default::default()
        };
        assert!(matches!(
            FileDescriptor::from_set(FileDescriptorSet {
                file: vec![dependent]
            }),
            Err(Error::UnresolvedType { .. })
        ));
    }

    #[test]
    fn test_lookup_relative() {
        let file = build();
        match file.lookup_relative("B", "pkg.A") {
            Some(Symbol::Message(m)) => assert_eq!(m.full_name(), "pkg.B"),
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            file.lookup_relative("pkg", "pkg.A"),
            Some(Symbol::Package(_))
        ));
    }

    #[test]
    fn test_stats_visitor() {
        let file = build();
        let mut stats = StatsVisitor::default();
        walk_file(&file, &mut stats);
        assert_eq!(stats.message_count, 4);
        assert_eq!(stats.field_count, 7);
        assert_eq!(stats.extension_count, 1);
        assert_eq!(stats.enum_count, 1);
        assert_eq!(stats.enum_value_count, 3);
        assert_eq!(stats.service_count, 1);
        assert_eq!(stats.method_count, 1);
    }
}
