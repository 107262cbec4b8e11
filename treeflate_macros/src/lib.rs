extern crate proc_macro;

use proc_macro::TokenStream;
use quote::quote;
use syn::{
    parse::{Parse, ParseStream},
    parse_macro_input,
    punctuated::Punctuated,
    LitInt, Token,
};

struct LenEntry {
    first: LitInt,
    // (end, inclusive)
    last: Option<(LitInt, bool)>,
    _arrow: Token![=>],
    len: LitInt,
}

impl Parse for LenEntry {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let first = input.parse()?;
        let last = if input.peek(Token![..=]) {
            let _: Token![..=] = input.parse()?;
            Some((input.parse()?, true))
        } else if input.peek(Token![..]) {
            let _: Token![..] = input.parse()?;
            Some((input.parse()?, false))
        } else {
            None
        };

        Ok(Self {
            first,
            last,
            _arrow: input.parse()?,
            len: input.parse()?,
        })
    }
}

impl LenEntry {
    fn syms(&self) -> syn::Result<core::ops::Range<usize>> {
        let first = self.first.base10_parse::<usize>()?;
        let end = match &self.last {
            None => first + 1,
            Some((last, true)) => last.base10_parse::<usize>()? + 1,
            Some((last, false)) => last.base10_parse::<usize>()?,
        };
        if end <= first {
            return Err(syn::Error::new(self.first.span(), "empty symbol range"));
        }
        Ok(first..end)
    }
}

struct MacroInput {
    entries: Punctuated<LenEntry, Token![,]>,
}

impl Parse for MacroInput {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        Ok(Self {
            entries: Punctuated::parse_terminated(input)?,
        })
    }
}

fn expand(input: MacroInput) -> syn::Result<Vec<u8>> {
    let mut lens: Vec<Option<u8>> = Vec::new();

    for entry in &input.entries {
        let syms = entry.syms()?;
        let len = entry.len.base10_parse::<u8>()?;
        if len > 15 {
            return Err(syn::Error::new(
                entry.len.span(),
                "DEFLATE code lengths cannot exceed 15",
            ));
        }

        if lens.len() < syms.end {
            lens.resize(syms.end, None);
        }
        for sym in syms {
            if lens[sym].is_some() {
                return Err(syn::Error::new(
                    entry.first.span(),
                    format!("symbol {} is given a code length twice", sym),
                ));
            }
            lens[sym] = Some(len);
        }
    }

    Ok(lens.into_iter().map(|l| l.unwrap_or(0)).collect())
}

/// Expands `sym => len` / `first..=last => len` entries into a `[u8; N]` array
/// of per-symbol code lengths. Symbols not mentioned get length 0.
#[proc_macro]
pub fn code_lengths(tokens: TokenStream) -> TokenStream {
    let input = parse_macro_input!(tokens as MacroInput);

    match expand(input) {
        Ok(lens) => quote! { [#(#lens),*] }.into(),
        Err(e) => e.to_compile_error().into(),
    }
}
