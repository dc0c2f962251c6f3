extern crate proc_macro;

use itertools::izip;
use proc_macro::TokenStream;
use proc_macro2::{Span, TokenStream as TokenStream2};
use quote::{format_ident, quote};
use std::collections::HashSet;
use syn::parse::ParseStream;
use syn::{
    parse_macro_input, Attribute, Data, DataEnum, DataStruct, DeriveInput, Fields, Ident, Lit,
    LitInt, LitStr, Path, Type,
};

/// Largest field number representable in a tag.
const FIELD_NUMBER_MAX: u32 = (1 << 29) - 1;

/// Member attributes parsed from `#[wire(...)]`.
///
/// * `number` - Field number; `None` for flattened members
/// * `handling` - Number handling flags of the member (`signed`, `fixed32`, `fixed64`)
/// * `value_handling` - Number handling flags of map values
/// * `wire_type` - Declared wire type of dynamic node members
/// * `flatten` - Merge the member's field table into the outer one
#[derive(Debug, Default)]
struct FieldAttributes {
    number: Option<u32>,
    handling: Vec<Ident>,
    value_handling: Vec<Ident>,
    wire_type: Option<Ident>,
    flatten: bool,
}

/// Type attributes parsed from `#[wire(...)]` on the struct or enum.
#[derive(Debug, Default)]
struct TypeAttributes {
    ignore_default_fields: bool,
    parent: Option<Path>,
    polymorphic: Option<(u32, bool)>,
}

/// Variant attributes of a polymorphic enum.
#[derive(Debug, Default)]
struct VariantAttributes {
    base: bool,
    discriminator: Option<Lit>,
}

fn wire_attrs(attrs: &[Attribute]) -> impl Iterator<Item = &Attribute> {
    attrs.iter().filter(|attr| attr.path().is_ident("wire"))
}

/// Consumes a trailing comma, if present.
fn skip_comma(input: ParseStream) -> syn::Result<()> {
    if input.peek(syn::Token![,]) {
        input.parse::<syn::Token![,]>()?;
    }
    Ok(())
}

fn parse_field_number(lit: &LitInt) -> syn::Result<u32> {
    let number = lit.base10_parse::<u32>()?;
    if number == 0 || number > FIELD_NUMBER_MAX {
        return Err(syn::Error::new(
            lit.span(),
            format!("Field number must be between 1 and {}", FIELD_NUMBER_MAX),
        ));
    }
    Ok(number)
}

/// Maps a `wire_type = "..."` value to a `WireType` variant name.
fn parse_wire_type(lit: &LitStr) -> syn::Result<Ident> {
    let variant = match lit.value().as_str() {
        "varint" | "VarInt" => "VarInt",
        "fixed64" | "Fixed64" => "Fixed64",
        "length_delimited" | "len" | "LengthDelimited" => "LengthDelimited",
        "fixed32" | "Fixed32" => "Fixed32",
        other => {
            return Err(syn::Error::new(
                lit.span(),
                format!("Unknown wire type: {}", other),
            ))
        }
    };
    Ok(Ident::new(variant, lit.span()))
}

/// Parses `#[wire(3)]`, `#[wire(field = 3, signed)]`, `#[wire(4, wire_type = "fixed32")]`,
/// `#[wire(flatten)]` and friends.
fn get_field_attributes(attrs: &[Attribute]) -> syn::Result<Option<FieldAttributes>> {
    let mut found = None;
    for attr in wire_attrs(attrs) {
        let parsed = attr.parse_args_with(|input: ParseStream| {
            let mut parsed = FieldAttributes::default();
            while !input.is_empty() {
                if input.peek(LitInt) {
                    parsed.number = Some(parse_field_number(&input.parse::<LitInt>()?)?);
                    skip_comma(input)?;
                    continue;
                }
                let ident = input.parse::<Ident>()?;
                match ident.to_string().as_str() {
                    "field" => {
                        input.parse::<syn::Token![=]>()?;
                        parsed.number = Some(parse_field_number(&input.parse::<LitInt>()?)?);
                    }
                    "signed" | "fixed32" | "fixed64" => parsed.handling.push(ident),
                    "value_signed" | "value_fixed32" | "value_fixed64" => {
                        parsed.value_handling.push(ident)
                    }
                    "wire_type" => {
                        input.parse::<syn::Token![=]>()?;
                        parsed.wire_type = Some(parse_wire_type(&input.parse::<LitStr>()?)?);
                    }
                    "flatten" => parsed.flatten = true,
                    _ => {
                        return Err(syn::Error::new(
                            ident.span(),
                            format!("Unknown attribute: {}", ident),
                        ))
                    }
                }
                skip_comma(input)?;
            }
            Ok(parsed)
        })?;
        found = Some(parsed);
    }

    if let Some(parsed) = &found {
        if parsed.flatten && parsed.number.is_some() {
            return Err(syn::Error::new(
                Span::call_site(),
                "A flattened member cannot have a field number",
            ));
        }
        if !parsed.flatten && parsed.number.is_none() {
            return Err(syn::Error::new(
                Span::call_site(),
                "#[wire(...)] requires a field number",
            ));
        }
    }
    Ok(found)
}

fn get_type_attributes(attrs: &[Attribute]) -> syn::Result<TypeAttributes> {
    let mut parsed = TypeAttributes::default();
    for attr in wire_attrs(attrs) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("ignore_default_fields") {
                parsed.ignore_default_fields = true;
                Ok(())
            } else if meta.path.is_ident("parent") {
                parsed.parent = Some(meta.value()?.parse::<Path>()?);
                Ok(())
            } else if meta.path.is_ident("polymorphic") {
                let mut field = 1;
                let mut fallback = true;
                meta.parse_nested_meta(|inner| {
                    if inner.path.is_ident("field") {
                        field = parse_field_number(&inner.value()?.parse::<LitInt>()?)?;
                        Ok(())
                    } else if inner.path.is_ident("fallback") {
                        fallback = inner.value()?.parse::<syn::LitBool>()?.value;
                        Ok(())
                    } else {
                        Err(inner.error("Unknown polymorphic option"))
                    }
                })?;
                parsed.polymorphic = Some((field, fallback));
                Ok(())
            } else {
                Err(meta.error("Unknown type attribute"))
            }
        })?;
    }
    Ok(parsed)
}

fn get_variant_attributes(attrs: &[Attribute]) -> syn::Result<VariantAttributes> {
    let mut parsed = VariantAttributes::default();
    for attr in wire_attrs(attrs) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("base") {
                parsed.base = true;
                Ok(())
            } else if meta.path.is_ident("discriminator") {
                parsed.discriminator = Some(meta.value()?.parse::<Lit>()?);
                Ok(())
            } else {
                Err(meta.error("Unknown variant attribute"))
            }
        })?;
    }
    Ok(parsed)
}

/// Builds the `FieldOptions` expression for a member.
fn field_options(attrs: &FieldAttributes) -> TokenStream2 {
    let handling = &attrs.handling;
    let value_handling = &attrs.value_handling;
    let wire_type = attrs
        .wire_type
        .as_ref()
        .map(|wt| quote! { .wire_type(::wirepack::WireType::#wt) });
    quote! {
        ::wirepack::FieldOptions::new()
            #(.#handling())*
            #(.#value_handling())*
            #wire_type
    }
}

/// The discriminator chain of `parent`, or an empty list.
fn ancestors(parent: &Option<Path>) -> TokenStream2 {
    match parent {
        Some(parent) => quote! { <#parent as ::wirepack::WireMessage>::discriminator_chain() },
        None => quote! { ::std::vec::Vec::new() },
    }
}

/// `WireField` impl carrying a message as a length-delimited nested value.
fn nested_field_impl(input: &DeriveInput) -> TokenStream2 {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    quote! {
        impl #impl_generics ::wirepack::WireField for #name #ty_generics #where_clause {
            fn wire_kind() -> ::wirepack::WireKind {
                ::wirepack::WireKind::Scalar(::wirepack::ScalarKind::new(
                    ::wirepack::WireType::LengthDelimited,
                    false,
                ))
            }

            fn write_value(
                &self,
                _spec: ::wirepack::metadata::ValueSpec,
                writer: &mut ::wirepack::WireWriter<'_>,
                registry: &::wirepack::TypeRegistry,
            ) -> ::wirepack::Result<()> {
                ::wirepack::serializer::write_nested(self, writer, registry)
            }

            fn read_value(
                _spec: ::wirepack::metadata::ValueSpec,
                reader: &mut ::wirepack::WireReader<'_>,
                registry: &::wirepack::TypeRegistry,
            ) -> ::wirepack::Result<Self> {
                ::wirepack::serializer::read_nested(reader, registry)
            }

            fn is_default(&self) -> bool {
                false
            }
        }
    }
}

/// Derive macro producing the field table of a message.
///
/// Structs with named fields become plain messages. Enums carrying
/// `#[wire(polymorphic(...))]` become polymorphic messages: one `#[wire(base)]` variant and
/// any number of `#[wire(discriminator = V)]` variants, each wrapping a single message.
///
/// # Examples
///
/// ```rust,ignore
/// #[derive(WireMessage, Default)]
/// struct Point {
///     #[wire(1, signed)]
///     x: i32,
///     #[wire(2, signed)]
///     y: i32,
///     cache: Option<String>,
/// }
/// ```
#[proc_macro_derive(WireMessage, attributes(wire))]
pub fn derive_wire_message(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let expanded = match &input.data {
        Data::Struct(data) => derive_struct(&input, data),
        Data::Enum(data) => derive_polymorphic_enum(&input, data),
        Data::Union(_) => Err(syn::Error::new(
            input.ident.span(),
            "WireMessage cannot be derived for unions",
        )),
    };
    expanded
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

fn derive_struct(input: &DeriveInput, data: &DataStruct) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let type_attrs = get_type_attributes(&input.attrs)?;
    if type_attrs.polymorphic.is_some() {
        return Err(syn::Error::new(
            name.span(),
            "polymorphic(...) applies to enums; derived structs declare #[wire(parent = ...)]",
        ));
    }
    let Fields::Named(fields) = &data.fields else {
        return Err(syn::Error::new(
            name.span(),
            "WireMessage can only be derived for structs with named fields",
        ));
    };

    let idents = fields.named.iter().filter_map(|f| f.ident.as_ref());
    let types = fields.named.iter().map(|f| &f.ty);
    let attrs = fields.named.iter().map(|f| &f.attrs);

    let mut registrations = Vec::new();
    let mut used_numbers = HashSet::new();
    for (ident, ty, attrs) in izip!(idents, types, attrs) {
        let Some(field_attrs) = get_field_attributes(attrs)? else {
            continue;
        };
        if field_attrs.flatten {
            registrations.push(quote! {
                .flatten(
                    &<#ty as ::wirepack::WireMessage>::type_info()?,
                    |m| ::core::option::Option::Some(&m.#ident),
                    |m| ::core::option::Option::Some(&mut m.#ident),
                )
            });
            continue;
        }
        let number = field_attrs.number.unwrap_or_default();
        if !used_numbers.insert(number) {
            panic!(
                "Field number {} is duplicated for struct '{}'. Please specify a different number for field '{}' using #[wire(...)].",
                number, name, ident
            );
        }
        let options = field_options(&field_attrs);
        let member = ident.to_string();
        registrations.push(quote! {
            .field_with::<#ty>(
                #number,
                #member,
                #options,
                |m| &m.#ident,
                |m| &mut m.#ident,
            )
        });
    }

    let mut generics = input.generics.clone();
    for param in generics.type_params_mut() {
        param.bounds.push(syn::parse_quote!(::wirepack::WireField));
    }
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();
    let ignore_default_fields = type_attrs.ignore_default_fields;
    let ancestors = ancestors(&type_attrs.parent);
    let mut field_input = input.clone();
    field_input.generics = generics.clone();
    let field_impl = nested_field_impl(&field_input);

    Ok(quote! {
        impl #impl_generics ::wirepack::WireMessage for #name #ty_generics #where_clause {
            fn type_info() -> ::wirepack::Result<::wirepack::TypeInfo<Self>> {
                ::wirepack::TypeInfo::<Self>::builder(
                    ::core::stringify!(#name),
                    <Self as ::core::default::Default>::default,
                )
                #(#registrations)*
                .ignore_default_fields(#ignore_default_fields)
                .ancestors(#ancestors)
                .build()
            }
        }

        #field_impl
    })
}

/// One single-payload variant of a polymorphic enum.
struct PolymorphicVariant<'a> {
    ident: &'a Ident,
    ty: &'a Type,
    attrs: VariantAttributes,
}

fn derive_polymorphic_enum(input: &DeriveInput, data: &DataEnum) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let type_attrs = get_type_attributes(&input.attrs)?;
    let Some((discriminator_field, fallback)) = type_attrs.polymorphic else {
        return Err(syn::Error::new(
            name.span(),
            "WireMessage enums require #[wire(polymorphic(field = N))]; use WireEnum for fieldless enums",
        ));
    };
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new(
            name.span(),
            "polymorphic messages cannot be generic",
        ));
    }

    let mut variants = Vec::new();
    for v in &data.variants {
        let ty = match &v.fields {
            Fields::Unnamed(fields) if fields.unnamed.len() == 1 => &fields.unnamed[0].ty,
            _ => {
                return Err(syn::Error::new(
                    v.ident.span(),
                    "polymorphic variants must wrap exactly one message",
                ))
            }
        };
        variants.push(PolymorphicVariant {
            ident: &v.ident,
            ty,
            attrs: get_variant_attributes(&v.attrs)?,
        });
    }

    let mut bases = variants.iter().filter(|v| v.attrs.base);
    let Some(base) = bases.next() else {
        return Err(syn::Error::new(
            name.span(),
            "polymorphic messages require one #[wire(base)] variant",
        ));
    };
    if let Some(extra) = bases.next() {
        return Err(syn::Error::new(
            extra.ident.span(),
            "only one variant can be #[wire(base)]",
        ));
    }

    let mut projections = Vec::new();
    let mut derived = Vec::new();
    let mut used_keys = HashSet::new();
    for variant in &variants {
        let ident = variant.ident;
        let ty = variant.ty;
        let get = format_ident!("__get_{}", ident);
        let get_mut = format_ident!("__get_mut_{}", ident);
        projections.push(quote! {
            #[allow(non_snake_case, unreachable_patterns)]
            fn #get(value: &#name) -> ::core::option::Option<&#ty> {
                match value {
                    #name::#ident(inner) => ::core::option::Option::Some(inner),
                    _ => ::core::option::Option::None,
                }
            }
            #[allow(non_snake_case, unreachable_patterns)]
            fn #get_mut(value: &mut #name) -> ::core::option::Option<&mut #ty> {
                match value {
                    #name::#ident(inner) => ::core::option::Option::Some(inner),
                    _ => ::core::option::Option::None,
                }
            }
        });

        if variant.attrs.base {
            continue;
        }
        let Some(key) = &variant.attrs.discriminator else {
            return Err(syn::Error::new(
                ident.span(),
                "derived variants require #[wire(discriminator = ...)]",
            ));
        };
        let key_text = quote!(#key).to_string();
        if !used_keys.insert(key_text.clone()) {
            panic!(
                "Discriminator {} is duplicated for enum '{}'. Please specify a different discriminator for variant '{}'.",
                key_text, name, ident
            );
        }
        derived.push(quote! {
            .derived(
                #key,
                ::wirepack::DerivedTypeInfo::variant(
                    &<#ty as ::wirepack::WireMessage>::type_info()?,
                    #name::#ident,
                    #get,
                    #get_mut,
                ),
            )?
        });
    }

    let base_ident = base.ident;
    let base_ty = base.ty;
    let base_get = format_ident!("__get_{}", base_ident);
    let base_get_mut = format_ident!("__get_mut_{}", base_ident);
    let ignore_default_fields = type_attrs.ignore_default_fields;
    let ancestors = ancestors(&type_attrs.parent);
    let field_impl = nested_field_impl(input);

    Ok(quote! {
        impl ::wirepack::WireMessage for #name {
            fn type_info() -> ::wirepack::Result<::wirepack::TypeInfo<Self>> {
                #(#projections)*

                let polymorphic = ::wirepack::PolymorphicInfo::new(#discriminator_field, #fallback)
                    #(#derived)*;
                ::wirepack::TypeInfo::<Self>::builder(::core::stringify!(#name), || {
                    #name::#base_ident(::core::default::Default::default())
                })
                .flatten(
                    &<#base_ty as ::wirepack::WireMessage>::type_info()?,
                    #base_get,
                    #base_get_mut,
                )
                .ignore_default_fields(#ignore_default_fields)
                .ancestors(#ancestors)
                .polymorphic(polymorphic)
                .build()
            }

            fn discriminator_chain() -> ::std::vec::Vec<u32> {
                let mut chain = #ancestors;
                chain.push(#discriminator_field);
                chain
            }
        }

        #field_impl
    })
}

/// Derive macro for fieldless enums carried as an `i32` varint.
///
/// Variants take their explicit discriminant, or the previous value plus one.
///
/// ```rust,ignore
/// #[derive(WireEnum, Clone, Copy, Default)]
/// enum Color {
///     #[default]
///     Red = 0,
///     Green = 1,
///     Blue = 5,
/// }
/// ```
#[proc_macro_derive(WireEnum)]
pub fn derive_wire_enum(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    derive_enum_values(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

fn derive_enum_values(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let Data::Enum(data) = &input.data else {
        return Err(syn::Error::new(
            name.span(),
            "WireEnum can only be derived for enums",
        ));
    };

    let mut to_arms = Vec::new();
    let mut from_arms = Vec::new();
    let mut used_values = HashSet::new();
    let mut next: i64 = 0;
    for v in &data.variants {
        if !matches!(v.fields, Fields::Unit) {
            return Err(syn::Error::new(
                v.ident.span(),
                "WireEnum variants cannot carry data",
            ));
        }
        let value = match &v.discriminant {
            Some((_, expr)) => parse_discriminant(expr)?,
            None => next,
        };
        let value = i32::try_from(value).map_err(|_| {
            syn::Error::new(v.ident.span(), "enum values must fit in an i32")
        })?;
        if !used_values.insert(value) {
            panic!(
                "Value {} is duplicated for enum '{}'. Please specify a different value for variant '{}'.",
                value, name, v.ident
            );
        }
        next = value as i64 + 1;
        let ident = &v.ident;
        to_arms.push(quote! { #name::#ident => #value, });
        from_arms.push(quote! { #value => ::core::option::Option::Some(#name::#ident), });
    }

    Ok(quote! {
        impl ::wirepack::WireEnum for #name {
            const NAME: &'static str = ::core::stringify!(#name);

            fn to_i32(self) -> i32 {
                match self {
                    #(#to_arms)*
                }
            }

            fn from_i32(value: i32) -> ::core::option::Option<Self> {
                match value {
                    #(#from_arms)*
                    _ => ::core::option::Option::None,
                }
            }
        }

        impl ::wirepack::WireField for #name {
            fn wire_kind() -> ::wirepack::WireKind {
                ::wirepack::core::enum_kind()
            }

            fn write_value(
                &self,
                spec: ::wirepack::metadata::ValueSpec,
                writer: &mut ::wirepack::WireWriter<'_>,
                _registry: &::wirepack::TypeRegistry,
            ) -> ::wirepack::Result<()> {
                ::wirepack::core::write_enum(*self, spec, writer)
            }

            fn read_value(
                spec: ::wirepack::metadata::ValueSpec,
                reader: &mut ::wirepack::WireReader<'_>,
                _registry: &::wirepack::TypeRegistry,
            ) -> ::wirepack::Result<Self> {
                ::wirepack::core::read_enum(spec, reader)
            }

            fn is_default(&self) -> bool {
                ::wirepack::WireEnum::to_i32(*self) == 0
            }

            fn discriminator(&self) -> ::core::option::Option<::wirepack::Discriminator> {
                ::core::option::Option::Some(::wirepack::Discriminator::Number(
                    ::wirepack::WireEnum::to_i32(*self) as i64,
                ))
            }
        }
    })
}

/// Evaluates an integer literal discriminant, optionally negated.
fn parse_discriminant(expr: &syn::Expr) -> syn::Result<i64> {
    match expr {
        syn::Expr::Lit(syn::ExprLit {
            lit: Lit::Int(lit), ..
        }) => lit.base10_parse::<i64>(),
        syn::Expr::Unary(syn::ExprUnary {
            op: syn::UnOp::Neg(_),
            expr,
            ..
        }) => parse_discriminant(expr).map(|v| -v),
        other => Err(syn::Error::new_spanned(
            other,
            "WireEnum discriminants must be integer literals",
        )),
    }
}
