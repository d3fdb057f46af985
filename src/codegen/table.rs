use proc_macro2::{Literal, TokenStream};
use quote::quote;

use crate::action::ActionList;
use crate::codegen::Emitter;
use crate::error::Result;

/// Emit the table-driven matcher: a `(state, byte class)` indexed
/// transition table, a parallel table of action sequence ids, and a small
/// loop interpreting them. Missing transitions are encoded as the negated
/// source state, so the dead-state check and the error signal are the same
/// table read.
///
/// States with guarded edges get a dispatch block ahead of the table
/// lookup; their unguarded edges still go through the table.
pub(crate) fn emit(e: &Emitter) -> Result<TokenStream> {
    let (p, p_end, cs, byte, is_eof) =
        (&e.p, &e.p_end, &e.cs, &e.byte, &e.is_eof);
    let escape = &e.escape;
    let read = e.read_byte();
    let init = e.hook(&e.config.init);
    let on_loop = e.hook(&e.config.on_loop);
    let on_return = e.hook(&e.config.on_return);
    let on_error = e.hook(&e.config.on_error);
    let classes = e.machine.byte_classes();
    let k = classes.alphabet_len();
    let n = e.machine.state_count();

    // Interned action sequences; sequence 0 is empty and doubles as the
    // entry for missing transitions.
    let mut seqs: Vec<ActionList> = vec![ActionList::empty()];
    let mut intern = |list: &ActionList| -> u16 {
        match seqs.iter().position(|s| s == list) {
            Some(i) => i as u16,
            None => {
                seqs.push(list.clone());
                (seqs.len() - 1) as u16
            }
        }
    };

    let mut trans = vec![0i32; (n + 1) * k];
    let mut acts = vec![0u16; (n + 1) * k];
    let mut guard_arms = Vec::new();
    for id in 1..=n as u32 {
        let row = id as usize * k;
        let mut checks = Vec::new();
        for c in 0..k {
            trans[row + c] = -(id as i32);
        }
        for edge in e.machine.edges(id) {
            if edge.guard().is_none() {
                let (lo, hi) = edge.range();
                let seq = intern(edge.actions());
                for b in lo as usize..=hi as usize {
                    let c = classes.get(b as u8) as usize;
                    trans[row + c] = edge.target() as i32;
                    acts[row + c] = seq;
                }
            } else {
                let (lo, hi) = edge.range();
                let lo_lit = Literal::u8_suffixed(lo);
                let hi_lit = Literal::u8_suffixed(hi);
                let guard = e.guard_expr(edge.guard())?.unwrap();
                let actions = e.action_bodies(edge.actions())?;
                let target = Literal::i32_suffixed(edge.target() as i32);
                checks.push(quote! {
                    if #lo_lit <= #byte && #byte <= #hi_lit && #guard {
                        #cs = #target;
                        #actions
                        if #cs <= 0 {
                            if #cs < 0 {
                                #on_error
                            }
                            break #escape;
                        }
                        #p += 1;
                        #on_loop
                        continue;
                    }
                });
            }
        }
        if !checks.is_empty() {
            let id_lit = Literal::i32_suffixed(id as i32);
            guard_arms.push(quote! { #id_lit => { #(#checks)* } });
        }
    }

    let guard_dispatch = if guard_arms.is_empty() {
        TokenStream::new()
    } else {
        quote! {
            match #cs {
                #(#guard_arms)*
                _ => {}
            }
        }
    };

    // Dispatch arms for every action id any sequence can fire.
    let mut action_ids: Vec<usize> =
        seqs.iter().flat_map(|s| s.iter()).collect();
    action_ids.sort();
    action_ids.dedup();
    let mut action_arms = Vec::new();
    for id in action_ids {
        let name = e.machine.action_name(id);
        let body = e
            .config
            .actions
            .get(name)
            .ok_or_else(|| crate::error::Error::missing_action_body(name))?;
        let id_lit = Literal::u16_suffixed(id as u16);
        action_arms.push(quote! { #id_lit => { #body } });
    }

    let class_lits = (0..256).map(|b| Literal::u8_suffixed(classes.get(b as u8)));
    let trans_lits = trans.iter().map(|&t| Literal::i32_suffixed(t));
    let acts_lits = acts.iter().map(|&a| Literal::u16_suffixed(a));
    let seq_rows = seqs.iter().map(|seq| {
        let ids = seq.iter().map(|id| Literal::u16_suffixed(id as u16));
        quote! { &[#(#ids),*] }
    });
    let total = Literal::usize_unsuffixed((n + 1) * k);
    let k_lit = Literal::usize_unsuffixed(k);

    let eof = e.eof_block()?;

    Ok(quote! {
        static __CLASSES: [u8; 256] = [#(#class_lits),*];
        static __TRANS: [i32; #total] = [#(#trans_lits),*];
        static __ACTS: [u16; #total] = [#(#acts_lits),*];
        static __ACT_SEQS: &[&[u16]] = &[#(#seq_rows),*];
        #init
        #escape: loop {
            while #p <= #p_end {
                let #byte = #read;
                #guard_dispatch
                let __class = __CLASSES[#byte as usize] as usize;
                let __idx = (#cs as usize) * #k_lit + __class;
                #cs = __TRANS[__idx];
                for &__a in __ACT_SEQS[__ACTS[__idx] as usize] {
                    match __a {
                        #(#action_arms)*
                        _ => {}
                    }
                }
                if #cs <= 0 {
                    if #cs < 0 {
                        #on_error
                    }
                    break #escape;
                }
                #p += 1;
                #on_loop
            }
            if #is_eof && #cs > 0 {
                #eof
            }
            break #escape;
        }
        #on_return
    })
}
