//! Late-bound COM automation through `IDispatch`.
//!
//! Excel is driven the way VBScript drives it: every member is looked up by
//! name and invoked with VARIANT arguments. [`DispatchObject`] exposes the
//! three invocation kinds the bridge needs (property get, property put and
//! method call) on top of one `Invoke` wrapper.

#![cfg(windows)]

use std::mem::ManuallyDrop;
use std::ptr;

use windows::{
    core::{BSTR, GUID, HSTRING, PCWSTR},
    Win32::{
        Foundation::{DISP_E_EXCEPTION, VARIANT_BOOL},
        Globalization::GetSystemDefaultLCID,
        System::{
            Com::{
                CLSIDFromProgID, CoCreateInstance, IDispatch, CLSCTX_LOCAL_SERVER, DISPATCH_FLAGS,
                DISPATCH_METHOD, DISPATCH_PROPERTYGET, DISPATCH_PROPERTYPUT, DISPPARAMS, EXCEPINFO,
            },
            Ole::DISPID_PROPERTYPUT,
            Variant::{
                VARIANT, VT_BOOL, VT_BSTR, VT_DISPATCH, VT_EMPTY, VT_I2, VT_I4, VT_NULL, VT_R4,
                VT_R8,
            },
        },
    },
};

// VARIANT keeps its unions in ManuallyDrop; fields are set with ptr::write.

pub fn variant_bool(val: bool) -> VARIANT {
    unsafe {
        let mut v = VARIANT::default();
        let inner = &mut *v.Anonymous.Anonymous;
        ptr::write(&mut inner.vt, VT_BOOL);
        ptr::write(
            &mut inner.Anonymous.boolVal,
            VARIANT_BOOL(if val { -1 } else { 0 }),
        );
        v
    }
}

pub fn variant_i32(val: i32) -> VARIANT {
    unsafe {
        let mut v = VARIANT::default();
        let inner = &mut *v.Anonymous.Anonymous;
        ptr::write(&mut inner.vt, VT_I4);
        ptr::write(&mut inner.Anonymous.lVal, val);
        v
    }
}

pub fn variant_f64(val: f64) -> VARIANT {
    unsafe {
        let mut v = VARIANT::default();
        let inner = &mut *v.Anonymous.Anonymous;
        ptr::write(&mut inner.vt, VT_R8);
        ptr::write(&mut inner.Anonymous.dblVal, val);
        v
    }
}

pub fn variant_str(val: &str) -> VARIANT {
    unsafe {
        let bstr = BSTR::from(val);
        let mut v = VARIANT::default();
        let inner = &mut *v.Anonymous.Anonymous;
        ptr::write(&mut inner.vt, VT_BSTR);
        ptr::write(&mut inner.Anonymous.bstrVal, ManuallyDrop::new(bstr));
        v
    }
}

fn variant_vt(v: &VARIANT) -> u16 {
    unsafe { v.Anonymous.Anonymous.vt.0 }
}

pub fn variant_get_bool(v: &VARIANT) -> Option<bool> {
    unsafe {
        (v.Anonymous.Anonymous.vt == VT_BOOL)
            .then(|| v.Anonymous.Anonymous.Anonymous.boolVal.0 != 0)
    }
}

/// Any numeric VARIANT as f64.
pub fn variant_get_f64(v: &VARIANT) -> Option<f64> {
    unsafe {
        let vt = v.Anonymous.Anonymous.vt;
        let anon = &v.Anonymous.Anonymous.Anonymous;
        match vt {
            VT_R8 => Some(anon.dblVal),
            VT_R4 => Some(anon.fltVal as f64),
            VT_I4 => Some(anon.lVal as f64),
            VT_I2 => Some(anon.iVal as f64),
            _ => None,
        }
    }
}

/// Integral VARIANT as i32. Doubles are accepted when they hold a whole number.
pub fn variant_get_i32(v: &VARIANT) -> Option<i32> {
    unsafe {
        let vt = v.Anonymous.Anonymous.vt;
        let anon = &v.Anonymous.Anonymous.Anonymous;
        match vt {
            VT_I4 => Some(anon.lVal),
            VT_I2 => Some(anon.iVal as i32),
            _ => variant_get_f64(v)
                .filter(|n| n.fract() == 0.0 && *n >= i32::MIN as f64 && *n <= i32::MAX as f64)
                .map(|n| n as i32),
        }
    }
}

pub fn variant_get_string(v: &VARIANT) -> Option<String> {
    unsafe {
        (v.Anonymous.Anonymous.vt == VT_BSTR)
            .then(|| v.Anonymous.Anonymous.Anonymous.bstrVal.to_string())
    }
}

fn variant_get_dispatch(v: &VARIANT) -> Option<IDispatch> {
    unsafe {
        if v.Anonymous.Anonymous.vt == VT_DISPATCH {
            let disp: &Option<IDispatch> = &v.Anonymous.Anonymous.Anonymous.pdispVal;
            disp.clone()
        } else {
            None
        }
    }
}

pub fn variant_is_empty(v: &VARIANT) -> bool {
    unsafe {
        let vt = v.Anonymous.Anonymous.vt;
        vt == VT_EMPTY || vt == VT_NULL
    }
}

/// An `IDispatch` COM object.
#[derive(Clone)]
pub struct DispatchObject {
    inner: IDispatch,
}

impl DispatchObject {
    /// Create a COM object from a ProgID such as `"Excel.Application"`.
    pub fn create_from_progid(progid: &str) -> Result<Self, String> {
        unsafe {
            let hstr = HSTRING::from(progid);
            let clsid =
                CLSIDFromProgID(&hstr).map_err(|e| format!("CLSIDFromProgID failed: {e}"))?;
            let inner: IDispatch = CoCreateInstance(&clsid, None, CLSCTX_LOCAL_SERVER)
                .map_err(|e| format!("CoCreateInstance failed for '{progid}': {e}"))?;
            Ok(Self { inner })
        }
    }

    fn dispid(&self, name: &str) -> Result<i32, String> {
        let wide: Vec<u16> = name.encode_utf16().chain(std::iter::once(0)).collect();
        let names = [PCWSTR(wide.as_ptr())];
        let mut dispid = 0i32;
        unsafe {
            self.inner
                .GetIDsOfNames(
                    &GUID::zeroed(),
                    names.as_ptr(),
                    1,
                    GetSystemDefaultLCID(),
                    &mut dispid,
                )
                .map_err(|e| format!("GetIDsOfNames('{name}') failed: {e}"))?;
        }
        Ok(dispid)
    }

    /// `Invoke` with arguments in natural order (reversed here for DISPPARAMS).
    fn invoke(
        &self,
        name: &str,
        flags: DISPATCH_FLAGS,
        args: &[VARIANT],
    ) -> Result<VARIANT, String> {
        let dispid = self.dispid(name)?;
        let put = flags == DISPATCH_PROPERTYPUT;

        let mut reversed: Vec<VARIANT> = args.iter().rev().cloned().collect();
        let mut named = [DISPID_PROPERTYPUT];
        let params = DISPPARAMS {
            rgvarg: if reversed.is_empty() {
                ptr::null_mut()
            } else {
                reversed.as_mut_ptr()
            },
            rgdispidNamedArgs: if put {
                named.as_mut_ptr()
            } else {
                ptr::null_mut()
            },
            cArgs: reversed.len() as u32,
            cNamedArgs: u32::from(put),
        };

        let mut result = VARIANT::default();
        let mut except = EXCEPINFO::default();
        unsafe {
            self.inner
                .Invoke(
                    dispid,
                    &GUID::zeroed(),
                    GetSystemDefaultLCID(),
                    flags,
                    &params,
                    Some(&mut result),
                    Some(&mut except),
                    None,
                )
                .map_err(|e| format_invoke_error(e, &except, name))?;
        }
        Ok(result)
    }

    /// `obj.Name` or, with arguments, `obj.Name(args...)` as a property read.
    pub fn get(&self, name: &str, args: &[VARIANT]) -> Result<VARIANT, String> {
        self.invoke(name, DISPATCH_PROPERTYGET, args)
    }

    /// `obj.Name = value`
    pub fn put(&self, name: &str, value: VARIANT) -> Result<(), String> {
        self.invoke(name, DISPATCH_PROPERTYPUT, &[value]).map(|_| ())
    }

    /// `obj.Name(args...)` as a method call.
    pub fn call(&self, name: &str, args: &[VARIANT]) -> Result<VARIANT, String> {
        self.invoke(name, DISPATCH_METHOD, args)
    }

    /// Property read that must return an object.
    pub fn get_obj(&self, name: &str, args: &[VARIANT]) -> Result<DispatchObject, String> {
        let variant = self.get(name, args)?;
        extract_dispatch(&variant, name)
    }

    /// Method call that must return an object.
    pub fn call_obj(&self, name: &str, args: &[VARIANT]) -> Result<DispatchObject, String> {
        let variant = self.call(name, args)?;
        extract_dispatch(&variant, name)
    }

    /// Property read that must return an integer.
    pub fn get_i32(&self, name: &str) -> Result<i32, String> {
        let variant = self.get(name, &[])?;
        variant_get_i32(&variant).ok_or_else(|| {
            format!(
                "'{name}' returned non-integer VARIANT (VT={})",
                variant_vt(&variant)
            )
        })
    }

    /// Property read that must return a number.
    pub fn get_f64(&self, name: &str) -> Result<f64, String> {
        let variant = self.get(name, &[])?;
        variant_get_f64(&variant).ok_or_else(|| {
            format!(
                "'{name}' returned non-numeric VARIANT (VT={})",
                variant_vt(&variant)
            )
        })
    }
}

fn extract_dispatch(variant: &VARIANT, context: &str) -> Result<DispatchObject, String> {
    if let Some(inner) = variant_get_dispatch(variant) {
        Ok(DispatchObject { inner })
    } else if variant_is_empty(variant) {
        Err(format!("'{context}' returned empty/null"))
    } else {
        Err(format!(
            "'{context}' returned non-object VARIANT (VT={}), expected VT_DISPATCH",
            variant_vt(variant)
        ))
    }
}

/// Invoke error text, with EXCEPINFO details for `DISP_E_EXCEPTION`.
fn format_invoke_error(err: windows::core::Error, except: &EXCEPINFO, member_name: &str) -> String {
    if err.code() != DISP_E_EXCEPTION {
        return format!("Invoke('{member_name}') failed: {err}");
    }
    let desc = if except.bstrDescription.is_empty() {
        "(no description)".to_string()
    } else {
        except.bstrDescription.to_string()
    };
    format!("COM exception in '{member_name}': {desc}")
}
