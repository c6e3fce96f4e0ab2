use fxhash::FxHashSet;
use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::{Attribute, Data, DeriveInput, Field, Fields, Ident, Type, Variant};

/// Parsed view of the annotated enum.
struct ErrorModel<'a> {
    name: &'a Ident,
    ext: Ident,
    variants: Vec<VariantModel<'a>>,
}

/// Parsed view of one variant: its wrapped foreign error and context slot.
struct VariantModel<'a> {
    ident: &'a Ident,
    source: Option<(&'a Ident, &'a Type)>,
    contextual: bool,
    cfg: Vec<&'a Attribute>,
}

pub fn expand(input: DeriveInput) -> TokenStream {
    match ErrorModel::parse(&input) {
        Ok(model) => model.render(&input),
        Err(err) => err.to_compile_error(),
    }
}

impl<'a> ErrorModel<'a> {
    fn parse(input: &'a DeriveInput) -> syn::Result<Self> {
        let Data::Enum(data) = &input.data else {
            return Err(syn::Error::new_spanned(
                &input.ident,
                "vexil_error can only be applied to enums",
            ));
        };

        let variants =
            data.variants.iter().map(VariantModel::parse).collect::<syn::Result<Vec<_>>>()?;

        Ok(Self { name: &input.ident, ext: format_ident!("{}Ext", input.ident), variants })
    }

    fn render(&self, input: &DeriveInput) -> TokenStream {
        let derives = missing_derives(input);
        let ext_trait = self.render_ext_trait();
        let conversions = self.variants.iter().filter_map(|v| self.render_source_conversion(v));
        let internal = self.render_internal_conversions();

        quote! {
            #[allow(non_shorthand_field_patterns)]
            #derives
            #input

            #ext_trait
            #(#conversions)*
            #internal

            #[allow(dead_code)]
            fn format_context(
                context: &Option<std::borrow::Cow<'static, str>>,
            ) -> std::borrow::Cow<'static, str> {
                match context {
                    Some(c) => std::borrow::Cow::Owned(format!(" ({c})")),
                    None => std::borrow::Cow::Borrowed(""),
                }
            }
        }
    }

    fn render_ext_trait(&self) -> TokenStream {
        let name = self.name;
        let ext = &self.ext;
        let arms = self.variants.iter().filter(|v| v.contextual).map(|v| {
            let ident = v.ident;
            let cfg = &v.cfg;
            quote! { #(#cfg)* #name::#ident { context: slot, .. } => *slot = Some(context.into()), }
        });

        quote! {
            pub trait #ext<T> {
                fn context(self, context: impl Into<std::borrow::Cow<'static, str>>) -> Result<T, #name>;
            }

            #[automatically_derived]
            impl<T> #ext<T> for Result<T, #name> {
                #[inline]
                fn context(self, context: impl Into<std::borrow::Cow<'static, str>>) -> Self {
                    self.map_err(|mut err| {
                        match &mut err {
                            #(#arms)*
                            _ => {}
                        }
                        err
                    })
                }
            }
        }
    }

    fn render_source_conversion(&self, v: &VariantModel<'_>) -> Option<TokenStream> {
        if v.ident == "Internal" {
            return None;
        }
        let (field, ty) = v.source?;
        let name = self.name;
        let ext = &self.ext;
        let ident = v.ident;
        let cfg = &v.cfg;

        Some(quote! {
            #(#cfg)*
            #[automatically_derived]
            impl From<#ty> for #name {
                #[inline]
                fn from(#field: #ty) -> Self {
                    Self::#ident { #field, context: None }
                }
            }

            #(#cfg)*
            impl<T> #ext<T> for std::result::Result<T, #ty> {
                #[inline]
                fn context(
                    self,
                    context: impl Into<std::borrow::Cow<'static, str>>,
                ) -> std::result::Result<T, #name> {
                    self.map_err(|#field| #name::#ident { #field, context: Some(context.into()) })
                }
            }
        })
    }

    fn render_internal_conversions(&self) -> TokenStream {
        let Some(internal) = self.variants.iter().find(|v| v.ident == "Internal") else {
            return TokenStream::new();
        };
        let name = self.name;
        let cfg = &internal.cfg;

        quote! {
            #(#cfg)*
            impl From<&'static str> for #name {
                #[inline]
                fn from(message: &'static str) -> Self {
                    Self::Internal { message: std::borrow::Cow::Borrowed(message), context: None }
                }
            }

            #(#cfg)*
            impl From<String> for #name {
                #[inline]
                fn from(message: String) -> Self {
                    Self::Internal { message: std::borrow::Cow::Owned(message), context: None }
                }
            }
        }
    }
}

impl<'a> VariantModel<'a> {
    fn parse(variant: &'a Variant) -> syn::Result<Self> {
        let Fields::Named(fields) = &variant.fields else {
            return Err(syn::Error::new_spanned(
                variant,
                "vexil_error variants must use named fields",
            ));
        };

        let context = fields.named.iter().find(|f| is_named(f, "context"));
        if let Some(field) = context {
            if !is_context_type(&field.ty) {
                return Err(syn::Error::new_spanned(
                    &field.ty,
                    "context field must be Option<Cow<'static, str>>",
                ));
            }
        }

        let source = fields
            .named
            .iter()
            .find(|f| is_named(f, "source") || has_attr(f, "source") || has_attr(f, "from"))
            .and_then(|f| f.ident.as_ref().map(|ident| (ident, &f.ty)));

        if source.is_some() && context.is_none() {
            return Err(syn::Error::new_spanned(
                &variant.ident,
                "vexil_error requires `context: Option<Cow<'static, str>>` next to a source field",
            ));
        }

        Ok(Self {
            ident: &variant.ident,
            source,
            contextual: context.is_some(),
            cfg: variant.attrs.iter().filter(|a| a.path().is_ident("cfg")).collect(),
        })
    }
}

fn is_named(field: &Field, name: &str) -> bool {
    field.ident.as_ref().is_some_and(|ident| ident == name)
}

fn has_attr(field: &Field, name: &str) -> bool {
    field.attrs.iter().any(|attr| attr.path().is_ident(name))
}

/// Accepts `Option<Cow<'static, str>>` with any path prefix on `Option`/`Cow`.
fn is_context_type(ty: &Type) -> bool {
    let rendered: String = quote!(#ty).to_string().chars().filter(|c| !c.is_whitespace()).collect();
    let Some(inner) = rendered.strip_suffix('>') else {
        return false;
    };
    let Some((outer, inner)) = inner.split_once('<') else {
        return false;
    };

    outer.rsplit("::").next() == Some("Option")
        && inner.rsplit_once("::").map_or(inner, |(_, tail)| tail) == "Cow<'static,str>"
}

fn missing_derives(input: &DeriveInput) -> TokenStream {
    let mut present = FxHashSet::default();
    for attr in input.attrs.iter().filter(|a| a.path().is_ident("derive")) {
        let _ = attr.parse_nested_meta(|meta| {
            if let Some(last) = meta.path.segments.last() {
                present.insert(last.ident.to_string());
            }
            Ok(())
        });
    }

    let mut derives = Vec::new();
    if !present.contains("Debug") {
        derives.push(quote! { Debug });
    }
    if !present.contains("Error") {
        derives.push(quote! { ::thiserror::Error });
    }

    if derives.is_empty() { TokenStream::new() } else { quote! { #[derive(#(#derives),*)] } }
}
